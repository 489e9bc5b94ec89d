//! Camera geometry: stream models, projection and color/depth correspondence.

pub mod epipolar;
pub mod intrinsics;
pub mod mapper;

pub use epipolar::EpipolarWalk;
pub use intrinsics::{DistortionModel, Extrinsics, Intrinsics};
pub use mapper::{deproject_pixel, project_to_pixel, transform, CoordinateMapper, DepthRange};
