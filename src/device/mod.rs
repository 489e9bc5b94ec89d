//! Streaming engine: acquisition thread, aligned frames and subscribers.

mod frame;
mod session;

pub use frame::AlignedFrameData;
pub use session::{AcquisitionStats, DepthDevice, FrameCallback, SubscriptionId};
