//! crabsense: aligned color and depth streaming for RGB-D cameras
//!
//! Opens a camera pipeline, aligns every depth frame to the color grid on a
//! background thread and hands each aligned pair to registered callbacks. A
//! [`CoordinateMapper`] translates between color pixels, depth pixels and
//! 3D camera space using the negotiated stream intrinsics and extrinsics.
//!
//! # Features
//! - Stream requests with wildcard matching
//! - Live, playback and record acquisition modes
//! - Background frame recording with a bounded queue
//! - Pinhole projection with the common lens distortion models
//! - A software driver for tests and offline use
//!
//! # Usage
//! ```rust,no_run
//! use crabsense::{DepthDevice, DeviceConfig, SyntheticPipeline, SyntheticScene};
//!
//! let mut device = DepthDevice::new(Box::new(SyntheticPipeline::new(SyntheticScene::default())));
//! device.on_frame(|frame| {
//!     println!("frame {} at {}", frame.frame_number, frame.timestamp);
//! });
//! device.open(Some(DeviceConfig::default_streams()))?;
//! // ...
//! device.close();
//! # Ok::<(), crabsense::SenseError>(())
//! ```
pub mod config;
pub mod device;
pub mod device_config;
pub mod errors;
pub mod geometry;
pub mod pipeline;
pub mod recording;
pub mod request;
pub mod types;

// Re-exports for convenience
pub use config::SenseConfig;
pub use device::{AlignedFrameData, DepthDevice, SubscriptionId};
pub use device_config::{DeviceConfig, StreamMode};
pub use errors::SenseError;
pub use geometry::{CoordinateMapper, DepthRange, DistortionModel, Extrinsics, Intrinsics};
pub use pipeline::{CameraPipeline, SyntheticPipeline, SyntheticScene};
pub use request::StreamRequest;
pub use types::{PixelFormat, StreamKind};

/// Initialize logging with `crabsense=info` unless `RUST_LOG` is set
pub fn init_logging() {
    init_logging_with("crabsense=info");
}

/// Initialize logging with `filter` unless `RUST_LOG` is set
pub fn init_logging_with(filter: &str) {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", filter);
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}
