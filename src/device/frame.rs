use chrono::{DateTime, Utc};

/// Color and depth of one acquisition cycle.
///
/// The streaming engine owns a single instance and overwrites it in place
/// every cycle; subscribers receive a borrow that is only valid for the
/// duration of their callback. Use [`snapshot`](Self::snapshot) to keep a
/// frame. Depth is aligned to the color grid, so both buffers share
/// `width` x `height`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFrameData {
    pub timestamp: DateTime<Utc>,
    pub frame_number: u64,
    pub width: u32,
    pub height: u32,
    /// Packed RGB, `width * height * 3` bytes
    pub color_data: Vec<u8>,
    /// Raw depth units, `width * height` samples
    pub depth_data: Vec<u16>,
}

impl AlignedFrameData {
    /// Zeroed buffers for a `width` x `height` stream.
    pub fn new(width: u32, height: u32) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            timestamp: DateTime::<Utc>::default(),
            frame_number: 0,
            width,
            height,
            color_data: vec![0; pixels * 3],
            depth_data: vec![0; pixels],
        }
    }

    /// Owned copy that outlives the callback.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Raw depth at `(x, y)`, or `None` outside the image.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.depth_data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Distance in meters at `(x, y)`; `None` outside the image or when the
    /// sample carries no measurement.
    pub fn distance_at(&self, x: u32, y: u32, depth_scale: f32) -> Option<f32> {
        self.depth_at(x, y)
            .filter(|&raw| raw != 0)
            .map(|raw| raw as f32 * depth_scale)
    }

    /// Mean distance in meters of the samples in the square window of
    /// `radius` around `(x, y)` whose raw value lies strictly inside
    /// `(min_raw, max_raw)`. Smooths single-pixel noise when probing depth.
    pub fn average_depth(
        &self,
        x: u32,
        y: u32,
        radius: u32,
        min_raw: u16,
        max_raw: u16,
        depth_scale: f32,
    ) -> Option<f32> {
        let x_min = x.saturating_sub(radius);
        let y_min = y.saturating_sub(radius);
        let x_max = x.saturating_add(radius).min(self.width);
        let y_max = y.saturating_add(radius).min(self.height);

        let mut sum = 0u64;
        let mut count = 0u64;
        for yy in y_min..y_max {
            for xx in x_min..x_max {
                if let Some(raw) = self.depth_at(xx, yy) {
                    if raw > min_raw && raw < max_raw {
                        sum += raw as u64;
                        count += 1;
                    }
                }
            }
        }

        if count == 0 {
            return None;
        }
        Some(sum as f32 / count as f32 * depth_scale)
    }

    /// Color buffer as an image, for export.
    pub fn color_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.color_data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_depth(values: &[u16], width: u32, height: u32) -> AlignedFrameData {
        let mut frame = AlignedFrameData::new(width, height);
        frame.depth_data.copy_from_slice(values);
        frame
    }

    #[test]
    fn test_buffer_sizes() {
        let frame = AlignedFrameData::new(640, 480);
        assert_eq!(frame.color_data.len(), 640 * 480 * 3);
        assert_eq!(frame.depth_data.len(), 640 * 480);
    }

    #[test]
    fn test_distance_at() {
        let frame = frame_with_depth(&[0, 1500, 2000, 2500], 2, 2);
        assert_eq!(frame.distance_at(0, 0, 0.001), None);
        assert!((frame.distance_at(1, 0, 0.001).unwrap() - 1.5).abs() < 1e-6);
        assert_eq!(frame.distance_at(2, 0, 0.001), None);
    }

    #[test]
    fn test_average_depth_ignores_out_of_range() {
        let frame = frame_with_depth(&[0, 1000, 3000, 9000], 2, 2);
        let avg = frame.average_depth(1, 1, 1, 0, 5000, 0.001).unwrap();
        assert!((avg - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_average_depth_without_samples() {
        let frame = frame_with_depth(&[0; 4], 2, 2);
        assert!(frame.average_depth(0, 0, 4, 0, 5000, 0.001).is_none());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut frame = AlignedFrameData::new(2, 1);
        let copy = frame.snapshot();
        frame.color_data[0] = 7;
        assert_eq!(copy.color_data[0], 0);
    }

    #[test]
    fn test_color_image_dimensions() {
        let image = AlignedFrameData::new(4, 3).color_image().unwrap();
        assert_eq!(image.dimensions(), (4, 3));
    }
}
