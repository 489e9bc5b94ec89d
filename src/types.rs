//! Stream kinds and pixel formats shared by requests, profiles and frames.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensor stream kind. `Any` acts as a wildcard in requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    #[default]
    Any,
    Depth,
    Color,
    Infrared,
    Fisheye,
    Gyro,
    Accel,
    Pose,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Any => "any",
            StreamKind::Depth => "depth",
            StreamKind::Color => "color",
            StreamKind::Infrared => "infrared",
            StreamKind::Fisheye => "fisheye",
            StreamKind::Gyro => "gyro",
            StreamKind::Accel => "accel",
            StreamKind::Pose => "pose",
        }
    }

    /// Whether frames of this kind carry a pixel grid.
    pub fn is_video(&self) -> bool {
        !matches!(self, StreamKind::Gyro | StreamKind::Accel | StreamKind::Pose)
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel format of a stream. `Any` acts as a wildcard in requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    #[default]
    Any,
    Z16,
    Disparity16,
    Y8,
    Y16,
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Yuyv,
    Uyvy,
    Raw16,
    MotionXyz32f,
}

impl PixelFormat {
    /// Bytes per pixel, or `None` for wildcard and non-image formats.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Y8 => Some(1),
            PixelFormat::Z16
            | PixelFormat::Disparity16
            | PixelFormat::Y16
            | PixelFormat::Raw16
            | PixelFormat::Yuyv
            | PixelFormat::Uyvy => Some(2),
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => Some(3),
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => Some(4),
            PixelFormat::Any | PixelFormat::MotionXyz32f => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            PixelFormat::Any => "any",
            PixelFormat::Z16 => "z16",
            PixelFormat::Disparity16 => "disparity16",
            PixelFormat::Y8 => "y8",
            PixelFormat::Y16 => "y16",
            PixelFormat::Rgb8 => "rgb8",
            PixelFormat::Bgr8 => "bgr8",
            PixelFormat::Rgba8 => "rgba8",
            PixelFormat::Bgra8 => "bgra8",
            PixelFormat::Yuyv => "yuyv",
            PixelFormat::Uyvy => "uyvy",
            PixelFormat::Raw16 => "raw16",
            PixelFormat::MotionXyz32f => "motion_xyz32f",
        };
        f.write_str(s)
    }
}
