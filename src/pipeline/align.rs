//! Software depth-to-color alignment.

use crate::geometry::{deproject_pixel, project_to_pixel, transform, Extrinsics, Intrinsics};
use glam::Vec2;

/// Resample a raw depth image into the pixel grid of `target`.
///
/// Each depth pixel is back-projected, moved into the target frame and
/// projected. When several samples land on one target pixel the nearest one
/// is kept. Target pixels receiving nothing stay 0 (no measurement).
pub fn align_depth_to(
    depth: &[u16],
    depth_intrinsics: &Intrinsics,
    target_intrinsics: &Intrinsics,
    depth_to_target: &Extrinsics,
    depth_scale: f32,
) -> Vec<u16> {
    let target_width = target_intrinsics.width as i64;
    let target_height = target_intrinsics.height as i64;
    let mut out = vec![0u16; target_intrinsics.pixel_count()];
    let mut nearest = vec![f32::INFINITY; out.len()];

    let width = depth_intrinsics.width as usize;
    for (index, &raw) in depth.iter().enumerate() {
        if raw == 0 {
            continue;
        }
        let u = (index % width) as f32;
        let v = (index / width) as f32;

        let point = deproject_pixel(depth_intrinsics, Vec2::new(u, v), raw as f32 * depth_scale);
        let moved = transform(point, depth_to_target);
        if moved.z <= 0.0 {
            continue;
        }
        let pixel = project_to_pixel(target_intrinsics, moved).round();

        let (x, y) = (pixel.x as i64, pixel.y as i64);
        if x < 0 || y < 0 || x >= target_width || y >= target_height {
            continue;
        }
        let target = (y * target_width + x) as usize;
        if moved.z < nearest[target] {
            nearest[target] = moved.z;
            out[target] = (moved.z / depth_scale).round().min(u16::MAX as f32) as u16;
        }
    }

    out
}
