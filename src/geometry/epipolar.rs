use glam::{IVec2, Vec2};

/// Pixels visited while searching an epipolar segment.
///
/// Steps one pixel at a time along the axis with the larger extent; the other
/// coordinate follows the line. Both endpoints are visited exactly once and no
/// pixel is visited twice.
#[derive(Debug, Clone)]
pub struct EpipolarWalk {
    start: IVec2,
    end: IVec2,
    steps: i32,
    index: i32,
}

/// Largest coordinate magnitude a walk endpoint keeps; f32 pixels are no
/// longer integral beyond it.
const COORDINATE_LIMIT: f32 = 16_777_216.0;

fn to_pixel(point: Vec2) -> IVec2 {
    point
        .round()
        .clamp(Vec2::splat(-COORDINATE_LIMIT), Vec2::splat(COORDINATE_LIMIT))
        .as_ivec2()
}

impl EpipolarWalk {
    /// Walk from `start` to `end`, both rounded to the nearest pixel and
    /// clamped to +/-2^24.
    pub fn new(start: Vec2, end: Vec2) -> Self {
        let start = to_pixel(start);
        let end = to_pixel(end);
        let delta = end - start;
        Self {
            start,
            end,
            steps: delta.x.abs().max(delta.y.abs()),
            index: 0,
        }
    }

    pub fn start(&self) -> IVec2 {
        self.start
    }

    pub fn end(&self) -> IVec2 {
        self.end
    }
}

impl Iterator for EpipolarWalk {
    type Item = IVec2;

    fn next(&mut self) -> Option<IVec2> {
        if self.index > self.steps {
            return None;
        }
        let i = self.index;
        self.index += 1;

        if self.steps == 0 {
            return Some(self.start);
        }

        let delta = self.end - self.start;
        let t = i as f32 / self.steps as f32;
        let pixel = if delta.x.abs() >= delta.y.abs() {
            let y = self.start.y as f32 + delta.y as f32 * t;
            IVec2::new(self.start.x + delta.x.signum() * i, y.round() as i32)
        } else {
            let x = self.start.x as f32 + delta.x as f32 * t;
            IVec2::new(x.round() as i32, self.start.y + delta.y.signum() * i)
        };
        Some(pixel)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.steps - self.index + 1).max(0) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for EpipolarWalk {}
