use crate::{
    config::GestureConfig,
    types::{ExtensionVector, Finger, Gesture, Point},
};

use super::geometry::HandGeometry;

/// A finger counts as extended when its tip lies clearly farther from the palm
/// than its base. The thumb goes through the same radial test even though it
/// mostly moves sideways, so thumb-only shapes can misfire on some hand poses.
pub fn is_extended(tip: Point, base: Point, palm_center: Point, threshold: f32) -> bool {
    tip.distance(palm_center) > base.distance(palm_center) * threshold
}

pub fn extension_vector(geometry: &HandGeometry, threshold: f32) -> ExtensionVector {
    let mut fingers = [false; 5];
    for (i, extended) in fingers.iter_mut().enumerate() {
        *extended = is_extended(
            geometry.tips[i],
            geometry.bases[i],
            geometry.palm_center,
            threshold,
        );
    }
    ExtensionVector(fingers)
}

/// Stateless per-frame classifier. First matching rule wins.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureClassifier {
    extension_threshold: f32,
    pinch_threshold: f32,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(&GestureConfig::default())
    }
}

impl GestureClassifier {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            extension_threshold: config.extension_threshold_multiplier,
            pinch_threshold: config.pinch_distance_threshold,
        }
    }

    pub fn extension_vector(&self, geometry: &HandGeometry) -> ExtensionVector {
        extension_vector(geometry, self.extension_threshold)
    }

    pub fn classify_geometry(&self, geometry: &HandGeometry) -> (ExtensionVector, Gesture) {
        let extended = self.extension_vector(geometry);
        (extended, self.classify(&geometry.tips, extended))
    }

    pub fn classify(&self, tips: &[Point; 5], extended: ExtensionVector) -> Gesture {
        use Finger::*;

        let pinched = tips[0].distance(tips[1]) < self.pinch_threshold;

        match extended.count() {
            5 => return Gesture::OpenPalm,
            // A pinch folds every finger, so touching tips win over a fist here.
            0 if pinched => return Gesture::Pinch,
            0 => return Gesture::Fist,
            _ => {}
        }
        if extended.is_exactly(&[Thumb]) {
            return Gesture::ThumbsUp;
        }
        if extended.is_exactly(&[Index, Middle]) {
            return Gesture::TwoFingers;
        }
        if extended.is_exactly(&[Index, Middle, Ring]) {
            return Gesture::ThreeFingers;
        }
        if extended.is_exactly(&[Index, Middle, Ring, Pinky]) {
            return Gesture::FourFingers;
        }
        if extended.is_exactly(&[Index]) {
            return Gesture::Point;
        }

        // Proximity fallback, independent of the extension pattern.
        if pinched {
            return Gesture::Pinch;
        }
        Gesture::None
    }
}
