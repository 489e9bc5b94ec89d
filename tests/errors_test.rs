#[cfg(test)]
mod error_tests {
    use crabsense::errors::SenseError;
    use std::error::Error;

    #[test]
    fn test_pipeline_error_display() {
        let error = SenseError::pipeline("device disconnected");
        assert_eq!(error.to_string(), "Pipeline error: device disconnected");
    }

    #[test]
    fn test_configuration_error_display() {
        let error = SenseError::configuration("bad stream");
        assert!(error.to_string().contains("Configuration error"));
        assert!(error.to_string().contains("bad stream"));
    }

    #[test]
    fn test_lifecycle_errors() {
        assert!(SenseError::AlreadyOpen.to_string().contains("already open"));
        assert_eq!(SenseError::NotOpen.to_string(), "Device is not open");
    }

    #[test]
    fn test_frame_mismatch_reports_sizes() {
        let error = SenseError::FrameMismatch {
            expected: 307200,
            actual: 76800,
        };
        let message = error.to_string();
        assert!(message.contains("307200"));
        assert!(message.contains("76800"));
    }

    #[test]
    fn test_io_error_conversion_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: SenseError = io.into();
        assert!(matches!(error, SenseError::Io(_)));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_json_error_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: SenseError = parse.into();
        assert!(matches!(error, SenseError::Serialization(_)));
    }

    #[test]
    fn test_error_debug_format() {
        let error = SenseError::recording("disk full");
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("Recording"));
        assert!(debug_str.contains("disk full"));
    }
}
