//! Tests for crabsense core types
//!
//! Stream requests, frames and the serialized forms used in settings files.

use crabsense::pipeline::{FrameData, VideoFrame};
use crabsense::{
    DeviceConfig, DistortionModel, Intrinsics, PixelFormat, StreamKind, StreamMode, StreamRequest,
};

fn color_frame(width: u32, height: u32) -> VideoFrame {
    VideoFrame {
        profile: StreamRequest::new(StreamKind::Color, PixelFormat::Rgb8, 30, 0, 640, 480),
        width,
        height,
        data: FrameData::Bytes(vec![0; (width * height * 3) as usize]),
    }
}

#[cfg(test)]
mod request_tests {
    use super::*;

    #[test]
    fn test_any_is_wildcard() {
        let any = StreamRequest::any();
        assert!(any.is_wildcard());
        assert_eq!(any.kind, StreamKind::Any);
        assert_eq!(any.format, PixelFormat::Any);
        assert_eq!(any.pixel_count(), 0);
    }

    #[test]
    fn test_from_frame_uses_actual_dimensions() {
        let frame = color_frame(320, 240);
        let request = StreamRequest::from_frame(&frame);
        assert_eq!((request.width, request.height), (320, 240));
        assert_eq!(request.frame_rate, 30);
    }

    #[test]
    fn test_conflict_with_frame() {
        let wanted = StreamRequest::new(StreamKind::Color, PixelFormat::Rgb8, 0, 0, 640, 480);
        assert!(!wanted.has_conflict_with_frame(&color_frame(640, 480)));
        assert!(wanted.has_conflict_with_frame(&color_frame(320, 240)));
    }

    #[test]
    fn test_request_json_shape() {
        let request = StreamRequest::new(StreamKind::Depth, PixelFormat::Z16, 30, 0, 848, 480);
        let json = serde_json::to_value(request).unwrap();
        assert_eq!(json["kind"], "depth");
        assert_eq!(json["format"], "z16");
        assert_eq!(json["width"], 848);
    }
}

#[cfg(test)]
mod frame_tests {
    use super::*;
    use crabsense::SenseError;

    #[test]
    fn test_copy_into_bytes() {
        let frame = color_frame(2, 2);
        let mut buffer = vec![9u8; 12];
        frame.copy_into_bytes(&mut buffer).unwrap();
        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_copy_into_short_buffer_fails() {
        let frame = color_frame(2, 2);
        let mut buffer = vec![9u8; 6];
        let result = frame.copy_into_bytes(&mut buffer);
        assert!(matches!(
            result,
            Err(SenseError::FrameMismatch {
                expected: 6,
                actual: 12
            })
        ));
        assert!(buffer.iter().all(|&b| b == 9));
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_device_config_json() {
        let config = DeviceConfig::default_streams().with_mode(StreamMode::Record);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"mode\":\"record\""));

        let back: DeviceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_device_config_missing_fields_default() {
        let config: DeviceConfig = serde_json::from_str("{\"mode\":\"playback\"}").unwrap();
        assert_eq!(config.mode, StreamMode::Playback);
        assert!(config.profiles.is_empty());
        assert!(config.playback_path.is_none());
    }

    #[test]
    fn test_distortion_model_names() {
        let intrinsics = Intrinsics::pinhole(640, 480, 615.0, 615.0)
            .with_distortion(DistortionModel::InverseBrownConrady, [0.1, 0.0, 0.0, 0.0, 0.0]);
        let json = serde_json::to_value(intrinsics).unwrap();
        assert_eq!(json["model"], "inverse_brown_conrady");
        assert_eq!(json["ppx"], 320.0);
    }
}
