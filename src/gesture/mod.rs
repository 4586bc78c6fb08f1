mod classifier;
mod debounce;
mod geometry;
mod pointer;

use std::time::Instant;

pub use classifier::GestureClassifier;
pub use debounce::Debouncer;
pub use geometry::extract;
pub use pointer::{PointerSmoother, to_screen};

use crate::{
    config::GestureConfig,
    types::{ExtensionVector, Gesture, LandmarkSet, Point},
};

/// What one frame produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameOutcome {
    /// The raw per-frame classification.
    pub gesture: Gesture,
    pub extended: Option<ExtensionVector>,
    /// Set only when the gesture changed since the last emitted one.
    pub event: Option<Gesture>,
    /// Wrist position, present whenever a hand is.
    pub hand_position: Option<Point>,
}

/// Classification followed by debouncing; the only stateful part is the debouncer.
#[derive(Debug)]
pub struct GestureEngine {
    classifier: GestureClassifier,
    debouncer: Debouncer,
}

impl GestureEngine {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            classifier: GestureClassifier::new(config),
            debouncer: Debouncer::from_seconds(config.gesture_cooldown_seconds),
        }
    }

    pub fn classify(&self, landmarks: Option<&LandmarkSet>) -> (Gesture, Option<ExtensionVector>) {
        match extract(landmarks) {
            Some(geometry) => {
                let (extended, gesture) = self.classifier.classify_geometry(&geometry);
                (gesture, Some(extended))
            }
            None => (Gesture::None, None),
        }
    }

    pub fn step(&mut self, landmarks: Option<&LandmarkSet>, now: Instant) -> FrameOutcome {
        let (gesture, extended) = self.classify(landmarks);
        let within_cooldown = !self.debouncer.cooldown_elapsed(now);
        let event = self.debouncer.observe(gesture, now);
        if event.is_some() && within_cooldown {
            log::debug!("{gesture} emitted inside the cooldown window");
        }

        FrameOutcome {
            gesture,
            extended,
            event,
            hand_position: landmarks.map(LandmarkSet::wrist),
        }
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::types::{BASE_IDS, LandmarkSet, NUM_LANDMARKS, Point, TIP_IDS, WRIST};

    /// A hand with the wrist at the bottom and each finger either reaching
    /// upward or curled onto its base. Thumb and index tips stay apart.
    pub fn hand(extended: [bool; 5]) -> LandmarkSet {
        let mut points = [Point::new(0.5, 0.5); NUM_LANDMARKS];
        points[WRIST] = Point::new(0.5, 0.9);
        for finger in 0..5 {
            let x = 0.3 + finger as f32 * 0.1;
            points[BASE_IDS[finger]] = Point::new(x, 0.7);
            points[TIP_IDS[finger]] = if extended[finger] {
                Point::new(x, 0.4)
            } else {
                Point::new(x, 0.72)
            };
        }
        LandmarkSet::new(points)
    }

    /// All fingers folded with thumb and index tips touching.
    pub fn pinching_hand() -> LandmarkSet {
        let mut points = *hand([false; 5]).points();
        points[TIP_IDS[0]] = Point::new(0.42, 0.72);
        points[TIP_IDS[1]] = Point::new(0.44, 0.72);
        LandmarkSet::new(points)
    }
}
