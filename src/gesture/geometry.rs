use crate::types::{BASE_IDS, LandmarkSet, Point, TIP_IDS};

/// Finger tips, finger bases and the palm reference point of one hand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandGeometry {
    pub tips: [Point; 5],
    pub bases: [Point; 5],
    /// The wrist; radial origin for extension tests.
    pub palm_center: Point,
}

impl HandGeometry {
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Self {
        Self {
            tips: TIP_IDS.map(|id| landmarks.point(id)),
            bases: BASE_IDS.map(|id| landmarks.point(id)),
            palm_center: landmarks.wrist(),
        }
    }
}

/// Absence of a hand propagates as `None`.
pub fn extract(landmarks: Option<&LandmarkSet>) -> Option<HandGeometry> {
    landmarks.map(HandGeometry::from_landmarks)
}
