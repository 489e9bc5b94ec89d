//! Requested device setup: acquisition mode plus stream requests.

use crate::pipeline::PipelineConfig;
use crate::request::StreamRequest;
use crate::types::{PixelFormat, StreamKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    #[default]
    Live,
    /// Replay a recording instead of a device
    Playback,
    /// Stream live and record to `record_path`
    Record,
}

/// Device configuration handed to [`DepthDevice::open`](crate::device::DepthDevice::open).
///
/// After opening, `profiles` is replaced with the streams the driver actually
/// negotiated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeviceConfig {
    pub mode: StreamMode,
    pub device_id: Option<String>,
    pub playback_path: Option<PathBuf>,
    pub record_path: Option<PathBuf>,
    pub profiles: Vec<StreamRequest>,
}

impl DeviceConfig {
    /// Live configuration for the given streams.
    pub fn new(profiles: Vec<StreamRequest>) -> Self {
        Self {
            profiles,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: StreamMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(id.into());
        self
    }

    pub fn with_playback_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.playback_path = Some(path.into());
        self
    }

    pub fn with_record_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.record_path = Some(path.into());
        self
    }

    /// Depth Z16, infrared Y8 and color RGB8 at 640x480, any frame rate.
    pub fn default_streams() -> Self {
        Self::new(vec![
            StreamRequest::new(StreamKind::Depth, PixelFormat::Z16, 0, -1, 640, 480),
            StreamRequest::new(StreamKind::Infrared, PixelFormat::Y8, 0, -1, 640, 480),
            StreamRequest::new(StreamKind::Color, PixelFormat::Rgb8, 0, -1, 640, 480),
        ])
    }

    /// Derive the driver configuration.
    ///
    /// Playback without a playback path falls back to Live; `mode` is
    /// updated to reflect that.
    pub fn to_pipeline_config(&mut self) -> PipelineConfig {
        let mut cfg = PipelineConfig::default();

        if self.mode == StreamMode::Playback {
            match non_empty(&self.playback_path) {
                Some(path) => {
                    cfg.enable_device_from_file(path);
                    return cfg;
                }
                None => {
                    log::debug!("No playback path configured, streaming live instead");
                    self.mode = StreamMode::Live;
                }
            }
        }

        if let Some(id) = &self.device_id {
            cfg.enable_device(id);
        }
        for profile in &self.profiles {
            cfg.enable_stream(*profile);
        }
        if self.mode == StreamMode::Record {
            if let Some(path) = non_empty(&self.record_path) {
                cfg.enable_record_to_file(path);
            }
        }

        cfg
    }

    pub fn profile(&self, kind: StreamKind) -> Option<&StreamRequest> {
        self.profiles.iter().find(|p| p.kind == kind)
    }

    pub fn color_profile(&self) -> Option<&StreamRequest> {
        self.profile(StreamKind::Color)
    }

    pub fn depth_profile(&self) -> Option<&StreamRequest> {
        self.profile(StreamKind::Depth)
    }
}

fn non_empty(path: &Option<PathBuf>) -> Option<PathBuf> {
    path.as_ref()
        .filter(|p| !p.as_os_str().is_empty())
        .cloned()
}
