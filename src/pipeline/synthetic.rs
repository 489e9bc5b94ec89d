//! Software camera driver producing a deterministic scene.
//!
//! Live mode renders a color gradient and a tilted depth plane. Record mode
//! additionally writes every frame pair (and the negotiated profile) to disk,
//! and Playback mode replays such a directory.

use super::align::align_depth_to;
use super::{
    ActiveProfile, CameraPipeline, FrameData, FrameSet, PipelineConfig, StreamLink, StreamProfile,
    VideoFrame,
};
use crate::errors::{Result, SenseError};
use crate::geometry::{Extrinsics, Intrinsics};
use crate::recording::writer;
use crate::request::StreamRequest;
use crate::types::{PixelFormat, StreamKind};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Optical layout and content of the synthetic camera.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    pub color_intrinsics: Intrinsics,
    pub depth_intrinsics: Intrinsics,
    /// Depth sensor to color sensor
    pub depth_to_color: Extrinsics,
    pub depth_scale: f32,
    pub frame_rate: i32,
    /// Sleep between frame sets to honor the frame rate
    pub realtime: bool,
    /// Plane depth at the top row, meters
    pub near_depth: f32,
    /// Plane depth at the bottom row, meters
    pub far_depth: f32,
    /// Every n-th frame set is delivered without a color frame
    pub incomplete_every: Option<u64>,
}

impl SyntheticScene {
    /// Co-located 640x480 color and depth sensors with identical optics.
    pub fn matched() -> Self {
        let intrinsics = Intrinsics::pinhole(640, 480, 615.0, 615.0);
        Self {
            color_intrinsics: intrinsics,
            depth_intrinsics: intrinsics,
            depth_to_color: Extrinsics::identity(),
            depth_scale: 0.001,
            frame_rate: 30,
            realtime: false,
            near_depth: 0.8,
            far_depth: 2.4,
            incomplete_every: None,
        }
    }

    /// Color and depth sensors with different fields of view and a 15 mm
    /// baseline, as on typical stereo depth cameras.
    pub fn offset() -> Self {
        Self {
            color_intrinsics: Intrinsics::pinhole(640, 480, 615.0, 615.0),
            depth_intrinsics: Intrinsics::pinhole(640, 480, 385.0, 385.0),
            depth_to_color: Extrinsics::from_translation([0.015, 0.0, 0.0]),
            ..Self::matched()
        }
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: i32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }

    /// Raw depth of the plane at row `v` of an image `height` rows tall.
    pub fn plane_depth(&self, v: u32, height: u32) -> u16 {
        let t = v as f32 / height.max(1) as f32;
        let meters = self.near_depth + (self.far_depth - self.near_depth) * t;
        (meters / self.depth_scale).round() as u16
    }
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self::matched()
    }
}

struct Playback {
    directory: PathBuf,
    indices: Vec<u64>,
}

struct Recording {
    directory: PathBuf,
    next_index: u64,
}

/// Software implementation of [`CameraPipeline`].
pub struct SyntheticPipeline {
    scene: SyntheticScene,
    active: Option<ActiveProfile>,
    playback: Option<Playback>,
    recording: Option<Recording>,
    frame_number: u64,
    epoch: DateTime<Utc>,
    next_deadline: Option<Instant>,
}

impl SyntheticPipeline {
    pub fn new(scene: SyntheticScene) -> Self {
        Self {
            scene,
            active: None,
            playback: None,
            recording: None,
            frame_number: 0,
            epoch: Utc::now(),
            next_deadline: None,
        }
    }

    pub fn scene(&self) -> &SyntheticScene {
        &self.scene
    }

    fn negotiate(&self, config: &PipelineConfig) -> Result<ActiveProfile> {
        let requested: Vec<StreamRequest> = if config.streams.is_empty() {
            vec![
                StreamRequest::new(StreamKind::Depth, PixelFormat::Any, 0, -1, 0, 0),
                StreamRequest::new(StreamKind::Color, PixelFormat::Any, 0, -1, 0, 0),
            ]
        } else {
            config.streams.clone()
        };

        let mut streams = Vec::with_capacity(requested.len());
        for request in requested {
            streams.push(self.negotiate_stream(request)?);
        }

        Ok(ActiveProfile {
            streams,
            links: vec![
                StreamLink {
                    from: StreamKind::Depth,
                    to: StreamKind::Color,
                    extrinsics: self.scene.depth_to_color,
                },
                StreamLink {
                    from: StreamKind::Infrared,
                    to: StreamKind::Depth,
                    extrinsics: Extrinsics::identity(),
                },
            ],
            depth_scale: self.scene.depth_scale,
        })
    }

    fn negotiate_stream(&self, request: StreamRequest) -> Result<StreamProfile> {
        let (base, format) = match request.kind {
            StreamKind::Color => (self.scene.color_intrinsics, PixelFormat::Rgb8),
            StreamKind::Depth => (self.scene.depth_intrinsics, PixelFormat::Z16),
            StreamKind::Infrared => (self.scene.depth_intrinsics, PixelFormat::Y8),
            other => {
                return Err(SenseError::pipeline(format!(
                    "synthetic camera has no {} stream",
                    other
                )))
            }
        };

        if request.format != PixelFormat::Any && request.format != format {
            return Err(SenseError::pipeline(format!(
                "{} stream does not support format {}",
                request.kind, request.format
            )));
        }

        let intrinsics = scale_intrinsics(base, request.width, request.height);
        let negotiated = StreamRequest {
            kind: request.kind,
            format,
            frame_rate: if request.frame_rate > 0 {
                request.frame_rate
            } else {
                self.scene.frame_rate
            },
            sub_index: request.sub_index.max(0),
            width: intrinsics.width as i32,
            height: intrinsics.height as i32,
        };

        Ok(StreamProfile {
            request: negotiated,
            intrinsics,
        })
    }

    fn start_playback(&mut self, directory: &Path) -> Result<ActiveProfile> {
        let profile = writer::read_profile(directory)?;
        let indices = writer::recorded_indices(directory)?;
        if indices.is_empty() {
            return Err(SenseError::pipeline(format!(
                "no recorded frames in {}",
                directory.display()
            )));
        }
        log::info!(
            "Playing back {} frame pairs from {}",
            indices.len(),
            directory.display()
        );
        self.playback = Some(Playback {
            directory: directory.to_path_buf(),
            indices,
        });
        Ok(profile)
    }

    fn render(&self, profile: &StreamProfile, frame_number: u64) -> VideoFrame {
        let intr = &profile.intrinsics;
        let (width, height) = (intr.width, intr.height);
        let data = match profile.kind() {
            StreamKind::Depth => {
                let mut depth = Vec::with_capacity(intr.pixel_count());
                for v in 0..height {
                    let raw = self.scene.plane_depth(v, height);
                    depth.extend(std::iter::repeat(raw).take(width as usize));
                }
                FrameData::Depth(depth)
            }
            StreamKind::Infrared => {
                let base = (frame_number % 256) as u8;
                let ir = (0..height)
                    .flat_map(|y| (0..width).map(move |x| base.wrapping_add(((x ^ y) % 256) as u8)))
                    .collect();
                FrameData::Bytes(ir)
            }
            _ => FrameData::Bytes(gradient_rgb(width, height, frame_number)),
        };

        VideoFrame {
            profile: profile.request,
            width,
            height,
            data,
        }
    }

    fn load_recorded(&self, playback: &Playback, active: &ActiveProfile) -> Result<Vec<VideoFrame>> {
        let slot = (self.frame_number % playback.indices.len() as u64) as usize;
        let index = playback.indices[slot];
        let (color, depth) = writer::read_frame_pair(&playback.directory, index)?;

        let mut frames = Vec::with_capacity(2);
        if let Some(profile) = active.stream(StreamKind::Color) {
            frames.push(VideoFrame {
                profile: profile.request,
                width: profile.intrinsics.width,
                height: profile.intrinsics.height,
                data: FrameData::Bytes(color),
            });
        }
        if let Some(profile) = active.stream(StreamKind::Depth) {
            frames.push(VideoFrame {
                profile: profile.request,
                width: profile.intrinsics.width,
                height: profile.intrinsics.height,
                data: FrameData::Depth(depth),
            });
        }
        Ok(frames)
    }

    fn record(&mut self, frames: &FrameSet) -> Result<()> {
        let Some(recording) = self.recording.as_mut() else {
            return Ok(());
        };
        let color = match frames.color_frame().map(|f| &f.data) {
            Some(FrameData::Bytes(b)) => b.as_slice(),
            _ => &[],
        };
        let depth = match frames.depth_frame().map(|f| &f.data) {
            Some(FrameData::Depth(d)) => d.as_slice(),
            _ => &[],
        };
        writer::write_frame_pair(&recording.directory, recording.next_index, color, depth)?;
        recording.next_index += 1;
        Ok(())
    }

    fn pace(&mut self) {
        if !self.scene.realtime {
            return;
        }
        let period = self.scene.frame_period();
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now);
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        self.next_deadline = Some(deadline.max(now) + period);
    }
}

impl CameraPipeline for SyntheticPipeline {
    fn start(&mut self, config: &PipelineConfig) -> Result<ActiveProfile> {
        if self.active.is_some() {
            return Err(SenseError::pipeline("pipeline already started"));
        }

        let active = match &config.playback_from {
            Some(directory) => self.start_playback(directory)?,
            None => self.negotiate(config)?,
        };

        if let Some(directory) = &config.record_to {
            std::fs::create_dir_all(directory)?;
            writer::write_profile(directory, &active)?;
            log::info!("Recording frame pairs to {}", directory.display());
            self.recording = Some(Recording {
                directory: directory.clone(),
                next_index: 0,
            });
        }

        self.frame_number = 0;
        self.epoch = Utc::now();
        self.next_deadline = None;
        self.active = Some(active.clone());
        log::info!("Synthetic pipeline started with {} streams", active.streams.len());
        Ok(active)
    }

    fn wait_for_frames(&mut self) -> Result<FrameSet> {
        let active = self
            .active
            .clone()
            .ok_or_else(|| SenseError::pipeline("pipeline not started"))?;
        self.pace();

        let frame_number = self.frame_number;
        let mut frames = match &self.playback {
            Some(playback) => self.load_recorded(playback, &active)?,
            None => active
                .streams
                .iter()
                .map(|profile| self.render(profile, frame_number))
                .collect(),
        };

        if let Some(every) = self.scene.incomplete_every.filter(|n| *n > 0) {
            if (frame_number + 1) % every == 0 {
                frames.retain(|f| f.kind() != StreamKind::Color);
            }
        }

        let period_ns = i64::try_from(self.scene.frame_period().as_nanos())
            .unwrap_or(i64::MAX)
            .max(1);
        let offset = period_ns.saturating_mul(frame_number as i64);
        let set = FrameSet {
            timestamp: self.epoch + chrono::Duration::nanoseconds(offset),
            frame_number,
            frames,
        };
        self.frame_number += 1;

        self.record(&set)?;
        Ok(set)
    }

    fn align(&mut self, frames: &FrameSet, target: StreamKind) -> Result<FrameSet> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| SenseError::pipeline("pipeline not started"))?;
        let depth_frame = frames
            .depth_frame()
            .ok_or_else(|| SenseError::pipeline("frame set has no depth frame"))?;
        let FrameData::Depth(depth) = &depth_frame.data else {
            return Err(SenseError::pipeline("depth frame carries no depth samples"));
        };

        let depth_intrinsics = active
            .intrinsics_of(StreamKind::Depth)
            .ok_or_else(|| SenseError::pipeline("depth stream not active"))?;
        let target_profile = *active
            .stream(target)
            .ok_or_else(|| SenseError::pipeline(format!("{} stream not active", target)))?;
        let extrinsics = active
            .extrinsics(StreamKind::Depth, target)
            .ok_or_else(|| SenseError::pipeline(format!("no extrinsics from depth to {}", target)))?;

        let target_intrinsics = target_profile.intrinsics;
        let aligned = if depth_intrinsics == target_intrinsics && extrinsics == Extrinsics::identity() {
            depth.clone()
        } else {
            align_depth_to(
                depth,
                &depth_intrinsics,
                &target_intrinsics,
                &extrinsics,
                active.depth_scale,
            )
        };

        let mut out = frames.clone();
        for frame in out.frames.iter_mut().filter(|f| f.kind() == StreamKind::Depth) {
            frame.width = target_intrinsics.width;
            frame.height = target_intrinsics.height;
            frame.profile.width = target_intrinsics.width as i32;
            frame.profile.height = target_intrinsics.height as i32;
            frame.data = FrameData::Depth(aligned.clone());
        }
        Ok(out)
    }

    fn stop(&mut self) -> Result<()> {
        if self.active.take().is_none() {
            return Err(SenseError::pipeline("pipeline not started"));
        }
        self.recording = None;
        self.playback = None;
        log::info!("Synthetic pipeline stopped after {} frame sets", self.frame_number);
        Ok(())
    }

    fn release(&mut self) {
        self.active = None;
        self.recording = None;
        self.playback = None;
    }
}

/// Rescale `base` to a requested resolution; zero keeps the native size.
fn scale_intrinsics(base: Intrinsics, width: i32, height: i32) -> Intrinsics {
    let width = if width > 0 { width as u32 } else { base.width };
    let height = if height > 0 { height as u32 } else { base.height };
    let sx = width as f32 / base.width as f32;
    let sy = height as f32 / base.height as f32;
    Intrinsics {
        width,
        height,
        ppx: base.ppx * sx,
        ppy: base.ppy * sy,
        fx: base.fx * sx,
        fy: base.fy * sy,
        ..base
    }
}

/// RGB gradient that shifts every frame.
pub fn gradient_rgb(width: u32, height: u32, frame_number: u64) -> Vec<u8> {
    let mut data = vec![0u8; (width * height * 3) as usize];
    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }
    data
}
