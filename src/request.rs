//! Requested stream descriptors and matching against delivered profiles.

use crate::pipeline::{StreamProfile, VideoFrame};
use crate::types::{PixelFormat, StreamKind};
use serde::{Deserialize, Serialize};

/// One requested sensor stream.
///
/// Zero width, height, frame rate or sub-index and the `Any` kind/format act
/// as wildcards when checking for conflicts. A negative sub-index means
/// "unspecified, pick any matching sub-stream".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct StreamRequest {
    pub kind: StreamKind,
    pub format: PixelFormat,
    pub frame_rate: i32,
    pub sub_index: i32,
    pub width: i32,
    pub height: i32,
}

impl StreamRequest {
    pub fn new(
        kind: StreamKind,
        format: PixelFormat,
        frame_rate: i32,
        sub_index: i32,
        width: i32,
        height: i32,
    ) -> Self {
        Self {
            kind,
            format,
            frame_rate,
            sub_index,
            width,
            height,
        }
    }

    /// Request matching any stream.
    pub fn any() -> Self {
        Self::default()
    }

    /// Describe a negotiated stream profile.
    pub fn from_profile(profile: &StreamProfile) -> Self {
        profile.request
    }

    /// Describe what a delivered frame actually carries.
    pub fn from_frame(frame: &VideoFrame) -> Self {
        Self {
            width: frame.width as i32,
            height: frame.height as i32,
            ..frame.profile
        }
    }

    /// Whether `other` violates any non-wildcard field of this request.
    pub fn has_conflict(&self, other: &StreamRequest) -> bool {
        if self.kind != StreamKind::Any && self.kind != other.kind {
            return true;
        }
        if self.format != PixelFormat::Any && self.format != other.format {
            return true;
        }
        if self.width != 0 && self.width != other.width {
            return true;
        }
        if self.height != 0 && self.height != other.height {
            return true;
        }
        if self.frame_rate != 0 && self.frame_rate != other.frame_rate {
            return true;
        }
        if self.sub_index != 0 && self.sub_index != other.sub_index {
            return true;
        }
        false
    }

    /// Same check as [`has_conflict`](Self::has_conflict), against the
    /// frame's profile and its actual dimensions.
    pub fn has_conflict_with_frame(&self, frame: &VideoFrame) -> bool {
        self.has_conflict(&Self::from_frame(frame))
    }

    pub fn is_wildcard(&self) -> bool {
        *self == Self::any()
    }

    pub fn pixel_count(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }
}
