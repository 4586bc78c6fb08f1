use crate::types::Point;

/// Exponential smoothing of screen-space cursor targets.
#[derive(Clone, Debug)]
pub struct PointerSmoother {
    alpha: f32,
    previous: Option<(f32, f32)>,
}

impl PointerSmoother {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(f32::EPSILON, 1.0),
            previous: None,
        }
    }

    /// The first sample passes through unchanged.
    pub fn update(&mut self, target: (f32, f32)) -> (f32, f32) {
        let next = match self.previous {
            Some((px, py)) => (
                self.alpha * target.0 + (1.0 - self.alpha) * px,
                self.alpha * target.1 + (1.0 - self.alpha) * py,
            ),
            None => target,
        };
        self.previous = Some(next);
        next
    }
}

/// Scales a normalized hand position to screen pixels.
pub fn to_screen(position: Point, screen: (u32, u32)) -> (f32, f32) {
    (
        position.x.clamp(0.0, 1.0) * screen.0 as f32,
        position.y.clamp(0.0, 1.0) * screen.1 as f32,
    )
}
