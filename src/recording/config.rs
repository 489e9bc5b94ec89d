//! Recording configuration types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Where and how to save acquired frames
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Output directory for frame pairs
    pub directory: PathBuf,
    /// Frames buffered between acquisition and the writer
    pub queue_capacity: usize,
}

impl RecordingConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

/// Statistics returned after finishing a recording
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Frame pairs saved to disk
    pub frames_written: u64,
    /// Frames rejected because the queue was full
    pub frames_dropped: u64,
    /// Frames whose files could not be written
    pub write_failures: u64,
    /// Message of the first write failure
    pub first_error: Option<String>,
    pub duration_secs: f64,
    pub output_directory: String,
}

impl RecordingStats {
    pub fn new(directory: &Path) -> Self {
        Self {
            output_directory: directory.to_string_lossy().to_string(),
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.frames_dropped == 0 && self.write_failures == 0
    }
}
