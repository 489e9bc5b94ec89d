use thiserror::Error;

/// Errors surfaced by the streaming engine, the pipeline drivers and the
/// recording subsystem.
///
/// Coordinate mapping never fails with an error: a missing stream yields an
/// absent mapper and degenerate geometry is guarded in place.
#[derive(Debug, Error)]
pub enum SenseError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Pipeline error: {0}")]
    Pipeline(String),
    #[error("Device is already open; close it before opening again")]
    AlreadyOpen,
    #[error("Device is not open")]
    NotOpen,
    #[error("Frame mismatch: expected {expected} elements, got {actual}")]
    FrameMismatch { expected: usize, actual: usize },
    #[error("Recording error: {0}")]
    Recording(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SenseError {
    pub fn pipeline(message: impl Into<String>) -> Self {
        SenseError::Pipeline(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        SenseError::Configuration(message.into())
    }

    pub fn recording(message: impl Into<String>) -> Self {
        SenseError::Recording(message.into())
    }
}

impl From<serde_json::Error> for SenseError {
    fn from(e: serde_json::Error) -> Self {
        SenseError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SenseError>;
