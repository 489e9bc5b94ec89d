//! Frame recording for crabsense
//!
//! Acquired frames are copied onto a bounded queue and written by a
//! background thread as raw `{index}_color.bin` / `{index}_depth.bin` pairs.
//!
//! # Example
//! ```rust,ignore
//! use crabsense::recording::{Recorder, RecordingConfig};
//!
//! let recorder = Recorder::start(RecordingConfig::new("captures/run-1"))?;
//!
//! // In your frame callback:
//! recorder.push(frame);
//!
//! // When done:
//! let stats = recorder.finish()?;
//! ```

mod config;
mod recorder;
pub mod writer;

pub use config::{RecordingConfig, RecordingStats, DEFAULT_QUEUE_CAPACITY};
pub use recorder::{CompletionCallback, Recorder};
