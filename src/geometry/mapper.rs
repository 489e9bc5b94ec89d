//! 2D/3D coordinate mapping between the color and depth streams.

use super::epipolar::EpipolarWalk;
use super::intrinsics::{DistortionModel, Extrinsics, Intrinsics};
use crate::device_config::DeviceConfig;
use crate::pipeline::ActiveProfile;
use crate::types::StreamKind;
use glam::{Mat3, Vec2, Vec3};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COLOR_WIDTH: u32 = 640;
pub const DEFAULT_COLOR_HEIGHT: u32 = 480;
pub const DEFAULT_DEPTH_WIDTH: u32 = 640;
pub const DEFAULT_DEPTH_HEIGHT: u32 = 480;

/// Depth interval, in meters, searched when mapping color pixels to depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthRange {
    pub min: f32,
    pub max: f32,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self { min: 0.1, max: 10.0 }
    }
}

/// Project a camera-space point onto the image plane of `intrinsics`.
pub fn project_to_pixel(intrinsics: &Intrinsics, point: Vec3) -> Vec2 {
    let mut x = point.x / point.z;
    let mut y = point.y / point.z;
    let c = &intrinsics.coeffs;

    match intrinsics.model {
        DistortionModel::ModifiedBrownConrady => {
            // Radial first, then tangential.
            let r2 = x * x + y * y;
            let f = 1.0 + c[0] * r2 + c[1] * r2 * r2 + c[4] * r2 * r2 * r2;
            x *= f;
            y *= f;
            let dx = x + 2.0 * c[2] * x * y + c[3] * (r2 + 2.0 * x * x);
            let dy = y + 2.0 * c[3] * x * y + c[2] * (r2 + 2.0 * y * y);
            x = dx;
            y = dy;
        }
        DistortionModel::Ftheta => {
            let r = (x * x + y * y).sqrt();
            // The optical axis and a zero field-of-view term are undistorted.
            if r > 0.0 && c[0] != 0.0 {
                let rd = (1.0 / c[0]) * (2.0 * r * (c[0] / 2.0).tan()).atan();
                x *= rd / r;
                y *= rd / r;
            }
        }
        _ => {}
    }

    Vec2::new(x * intrinsics.fx + intrinsics.ppx, y * intrinsics.fy + intrinsics.ppy)
}

/// Back-project a pixel at `depth` meters into camera space.
pub fn deproject_pixel(intrinsics: &Intrinsics, pixel: Vec2, depth: f32) -> Vec3 {
    let mut x = (pixel.x - intrinsics.ppx) / intrinsics.fx;
    let mut y = (pixel.y - intrinsics.ppy) / intrinsics.fy;
    let c = &intrinsics.coeffs;

    if intrinsics.model == DistortionModel::InverseBrownConrady {
        let r2 = x * x + y * y;
        let f = 1.0 + c[0] * r2 + c[1] * r2 * r2 + c[4] * r2 * r2 * r2;
        let ux = x * f + 2.0 * c[2] * x * y + c[3] * (r2 + 2.0 * x * x);
        let uy = y * f + 2.0 * c[3] * x * y + c[2] * (r2 + 2.0 * y * y);
        x = ux;
        y = uy;
    }

    Vec3::new(depth * x, depth * y, depth)
}

/// Move a point from the source stream's frame into the target stream's frame.
pub fn transform(point: Vec3, extrinsics: &Extrinsics) -> Vec3 {
    Mat3::from_cols_array(&extrinsics.rotation) * point + Vec3::from_array(extrinsics.translation)
}

fn clamp_to_image(pixel: Vec2, width: u32, height: u32) -> Vec2 {
    let max_x = width.saturating_sub(1) as f32;
    let max_y = height.saturating_sub(1) as f32;
    Vec2::new(pixel.x.clamp(0.0, max_x), pixel.y.clamp(0.0, max_y))
}

/// Converts between color pixels, depth pixels and camera-space points of one
/// streaming session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateMapper {
    color_intrinsics: Intrinsics,
    /// Color to depth
    color_extrinsics: Extrinsics,
    depth_intrinsics: Intrinsics,
    /// Depth to color
    depth_extrinsics: Extrinsics,
    color_and_depth_match: bool,
}

impl CoordinateMapper {
    pub fn new(
        color_intrinsics: Intrinsics,
        color_extrinsics: Extrinsics,
        depth_intrinsics: Intrinsics,
        depth_extrinsics: Extrinsics,
    ) -> Self {
        // Heuristic only: equal models do not prove the sensors are co-located.
        let color_and_depth_match = color_intrinsics.same_geometry(&depth_intrinsics);
        Self {
            color_intrinsics,
            color_extrinsics,
            depth_intrinsics,
            depth_extrinsics,
            color_and_depth_match,
        }
    }

    /// Build a mapper from the color and depth streams of the requested
    /// resolutions, or `None` when either stream is not active.
    pub fn from_profile(
        active: &ActiveProfile,
        color_size: (u32, u32),
        depth_size: (u32, u32),
    ) -> Option<Self> {
        let color = active.find(StreamKind::Color, color_size.0, color_size.1)?;
        let depth = active.find(StreamKind::Depth, depth_size.0, depth_size.1)?;

        let color_extrinsics = active.extrinsics(StreamKind::Color, StreamKind::Depth)?;
        let depth_extrinsics = active.extrinsics(StreamKind::Depth, StreamKind::Color)?;

        Some(Self::new(
            color.intrinsics,
            color_extrinsics,
            depth.intrinsics,
            depth_extrinsics,
        ))
    }

    /// Build a mapper using the color/depth resolutions named by `config`,
    /// falling back to 640x480 for a kind the config does not mention.
    pub fn from_device_config(active: &ActiveProfile, config: &DeviceConfig) -> Option<Self> {
        let mut color_size = (DEFAULT_COLOR_WIDTH, DEFAULT_COLOR_HEIGHT);
        let mut depth_size = (DEFAULT_DEPTH_WIDTH, DEFAULT_DEPTH_HEIGHT);

        for profile in &config.profiles {
            let size = (profile.width.max(0) as u32, profile.height.max(0) as u32);
            match profile.kind {
                StreamKind::Color => color_size = size,
                StreamKind::Depth => depth_size = size,
                _ => {}
            }
        }

        Self::from_profile(active, color_size, depth_size)
    }

    pub fn color_intrinsics(&self) -> &Intrinsics {
        &self.color_intrinsics
    }

    pub fn color_extrinsics(&self) -> &Extrinsics {
        &self.color_extrinsics
    }

    pub fn depth_intrinsics(&self) -> &Intrinsics {
        &self.depth_intrinsics
    }

    pub fn depth_extrinsics(&self) -> &Extrinsics {
        &self.depth_extrinsics
    }

    pub fn color_and_depth_match(&self) -> bool {
        self.color_and_depth_match
    }

    pub fn map_world_to_color(&self, point: Vec3) -> Vec2 {
        project_to_pixel(&self.color_intrinsics, point)
    }

    pub fn map_world_to_depth(&self, point: Vec3) -> Vec2 {
        project_to_pixel(&self.depth_intrinsics, point)
    }

    pub fn map_color_to_world(&self, pixel: Vec2, depth: f32) -> Vec3 {
        deproject_pixel(&self.color_intrinsics, pixel, depth)
    }

    pub fn map_depth_to_world(&self, pixel: Vec2, depth: f32) -> Vec3 {
        deproject_pixel(&self.depth_intrinsics, pixel, depth)
    }

    /// Find the depth pixel whose measurement projects closest to
    /// `color_pixel`.
    ///
    /// `depth_data` is the raw depth image in depth-stream resolution,
    /// row-major; `depth_scale` converts raw units to meters. Samples outside
    /// the buffer and zero samples are ignored. Returns `(0, 0)` when no
    /// sample along the epipolar segment is valid.
    pub fn map_color_to_depth(
        &self,
        color_pixel: Vec2,
        depth_data: &[u16],
        depth_scale: f32,
        range: DepthRange,
    ) -> Vec2 {
        if self.color_and_depth_match {
            return color_pixel;
        }

        let (start, end) = self.epipolar_segment(color_pixel, range);
        let width = self.depth_intrinsics.width as usize;

        let mut best: Option<(f32, Vec2)> = None;
        for p in EpipolarWalk::new(start, end) {
            let index = p.y as usize * width + p.x as usize;
            let raw = match depth_data.get(index) {
                Some(&raw) if raw != 0 => raw,
                _ => continue,
            };
            let depth = depth_scale * raw as f32;

            let pixel = p.as_vec2();
            let point = self.map_depth_to_world(pixel, depth);
            let projected = self.map_world_to_color(transform(point, &self.depth_extrinsics));
            let distance = projected.distance_squared(color_pixel);

            // Strict comparison: the first minimum along the walk wins ties.
            if best.map_or(true, |(min, _)| distance < min) {
                best = Some((distance, pixel));
            }
        }

        best.map(|(_, pixel)| pixel).unwrap_or(Vec2::ZERO)
    }

    /// Depth-image segment containing every possible correspondence of
    /// `color_pixel` within `range`, clamped to the depth image.
    pub fn epipolar_segment(&self, color_pixel: Vec2, range: DepthRange) -> (Vec2, Vec2) {
        let endpoint = |depth: f32| {
            let point = self.map_color_to_world(color_pixel, depth);
            let pixel = self.map_world_to_depth(transform(point, &self.color_extrinsics));
            clamp_to_image(pixel, self.depth_intrinsics.width, self.depth_intrinsics.height)
        };
        (endpoint(range.min), endpoint(range.max))
    }
}
