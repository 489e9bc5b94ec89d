//! Camera driver interface consumed by the streaming engine.
//!
//! A driver starts streaming from a [`PipelineConfig`], reports the negotiated
//! [`ActiveProfile`], blocks for [`FrameSet`]s and resamples depth into
//! another stream's pixel grid. [`SyntheticPipeline`] is a software driver
//! usable without hardware.

pub mod align;
pub mod synthetic;

pub use synthetic::{SyntheticPipeline, SyntheticScene};

use crate::errors::{Result, SenseError};
use crate::geometry::{Extrinsics, Intrinsics};
use crate::request::StreamRequest;
use crate::types::StreamKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Low-level configuration handed to a driver when starting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Device serial number; `None` selects any device
    pub device_id: Option<String>,
    pub streams: Vec<StreamRequest>,
    /// Replay a recording instead of opening a device
    pub playback_from: Option<PathBuf>,
    /// Record every frame set while streaming
    pub record_to: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn enable_device(&mut self, device_id: &str) {
        if !device_id.is_empty() {
            self.device_id = Some(device_id.to_string());
        }
    }

    pub fn enable_stream(&mut self, request: StreamRequest) {
        self.streams.push(request);
    }

    pub fn enable_device_from_file(&mut self, path: impl Into<PathBuf>) {
        self.playback_from = Some(path.into());
    }

    pub fn enable_record_to_file(&mut self, path: impl Into<PathBuf>) {
        self.record_to = Some(path.into());
    }
}

/// A stream as actually delivered by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamProfile {
    pub request: StreamRequest,
    pub intrinsics: Intrinsics,
}

impl StreamProfile {
    pub fn kind(&self) -> StreamKind {
        self.request.kind
    }
}

/// Rigid transform between two active streams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamLink {
    pub from: StreamKind,
    pub to: StreamKind,
    pub extrinsics: Extrinsics,
}

/// Streams negotiated by [`CameraPipeline::start`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveProfile {
    pub streams: Vec<StreamProfile>,
    pub links: Vec<StreamLink>,
    /// Meters per raw depth unit
    pub depth_scale: f32,
}

impl ActiveProfile {
    /// First stream of `kind` with the given resolution.
    pub fn find(&self, kind: StreamKind, width: u32, height: u32) -> Option<&StreamProfile> {
        self.streams.iter().find(|s| {
            s.kind() == kind && s.intrinsics.width == width && s.intrinsics.height == height
        })
    }

    /// First stream of `kind`, any resolution.
    pub fn stream(&self, kind: StreamKind) -> Option<&StreamProfile> {
        self.streams.iter().find(|s| s.kind() == kind)
    }

    pub fn intrinsics_of(&self, kind: StreamKind) -> Option<Intrinsics> {
        self.stream(kind).map(|s| s.intrinsics)
    }

    /// Transform from `from` into `to`, inverting a stored reverse link when
    /// only that one is known.
    pub fn extrinsics(&self, from: StreamKind, to: StreamKind) -> Option<Extrinsics> {
        if from == to {
            return Some(Extrinsics::identity());
        }
        self.links
            .iter()
            .find(|l| l.from == from && l.to == to)
            .map(|l| l.extrinsics)
            .or_else(|| {
                self.links
                    .iter()
                    .find(|l| l.from == to && l.to == from)
                    .map(|l| l.extrinsics.inverse())
            })
    }

    /// Requests describing the negotiated streams.
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.streams.iter().map(StreamRequest::from_profile).collect()
    }
}

/// Pixel payload of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameData {
    Bytes(Vec<u8>),
    Depth(Vec<u16>),
}

impl FrameData {
    pub fn len(&self) -> usize {
        match self {
            FrameData::Bytes(b) => b.len(),
            FrameData::Depth(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One stream's image within a frame set.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub profile: StreamRequest,
    pub width: u32,
    pub height: u32,
    pub data: FrameData,
}

impl VideoFrame {
    pub fn kind(&self) -> StreamKind {
        self.profile.kind
    }

    /// Copy packed bytes into `buffer`. Sizes must match exactly; nothing
    /// is written on mismatch.
    pub fn copy_into_bytes(&self, buffer: &mut [u8]) -> Result<()> {
        match &self.data {
            FrameData::Bytes(data) if data.len() == buffer.len() => {
                buffer.copy_from_slice(data);
                Ok(())
            }
            FrameData::Bytes(data) => Err(SenseError::FrameMismatch {
                expected: buffer.len(),
                actual: data.len(),
            }),
            FrameData::Depth(_) => Err(SenseError::pipeline(format!(
                "{} frame carries depth samples, not bytes",
                self.kind()
            ))),
        }
    }

    /// Copy depth samples into `buffer`. Sizes must match exactly; nothing
    /// is written on mismatch.
    pub fn copy_into_depth(&self, buffer: &mut [u16]) -> Result<()> {
        match &self.data {
            FrameData::Depth(data) if data.len() == buffer.len() => {
                buffer.copy_from_slice(data);
                Ok(())
            }
            FrameData::Depth(data) => Err(SenseError::FrameMismatch {
                expected: buffer.len(),
                actual: data.len(),
            }),
            FrameData::Bytes(_) => Err(SenseError::pipeline(format!(
                "{} frame carries bytes, not depth samples",
                self.kind()
            ))),
        }
    }
}

/// Frames captured together by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSet {
    pub timestamp: DateTime<Utc>,
    pub frame_number: u64,
    pub frames: Vec<VideoFrame>,
}

impl FrameSet {
    pub fn frame(&self, kind: StreamKind) -> Option<&VideoFrame> {
        self.frames.iter().find(|f| f.kind() == kind)
    }

    pub fn color_frame(&self) -> Option<&VideoFrame> {
        self.frame(StreamKind::Color)
    }

    pub fn depth_frame(&self) -> Option<&VideoFrame> {
        self.frame(StreamKind::Depth)
    }
}

/// Camera driver used by [`DepthDevice`](crate::device::DepthDevice).
///
/// The engine moves the driver onto its acquisition thread while streaming,
/// hence the `Send` bound.
pub trait CameraPipeline: Send {
    /// Start streaming and report the negotiated streams.
    fn start(&mut self, config: &PipelineConfig) -> Result<ActiveProfile>;

    /// Block until the next frame set arrives.
    fn wait_for_frames(&mut self) -> Result<FrameSet>;

    /// Resample the depth frame of `frames` into the pixel grid of `target`.
    fn align(&mut self, frames: &FrameSet, target: StreamKind) -> Result<FrameSet>;

    fn stop(&mut self) -> Result<()>;

    /// Release device handles. A released driver may be started again.
    fn release(&mut self);
}
