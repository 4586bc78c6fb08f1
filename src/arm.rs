use crate::types::{LandmarkSet, MIDDLE_TIP, WRIST};

pub const SEGMENT_LENGTHS: [f32; 3] = [150.0, 120.0, 80.0];
pub const ARM_ORIGIN: (f32, f32) = (400.0, 300.0);

/// Joint angles of the virtual three-segment arm, in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ArmPose {
    pub shoulder: f32,
    pub elbow: f32,
    pub wrist: f32,
}

impl ArmPose {
    /// Wrist position drives shoulder and elbow; the wrist-to-middle-tip
    /// direction drives the wrist joint.
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Self {
        let wrist = landmarks.point(WRIST);
        let middle = landmarks.point(MIDDLE_TIP);
        let tilt = (middle.y - wrist.y).atan2(middle.x - wrist.x);

        Self {
            shoulder: (wrist.x - 0.5) * 180.0,
            elbow: (wrist.y - 0.5) * 180.0,
            wrist: tilt.to_degrees(),
        }
    }

    /// Joint positions from the base outward, ending at the end effector.
    /// Each angle is absolute, not relative to the previous segment.
    pub fn joints(&self, origin: (f32, f32)) -> [(f32, f32); 4] {
        let angles = [self.shoulder, self.elbow, self.wrist];
        let mut joints = [origin; 4];
        for i in 0..3 {
            let (x, y) = joints[i];
            let rad = angles[i].to_radians();
            joints[i + 1] = (
                x + SEGMENT_LENGTHS[i] * rad.cos(),
                y + SEGMENT_LENGTHS[i] * rad.sin(),
            );
        }
        joints
    }

    pub fn end_effector(&self) -> (f32, f32) {
        self.joints(ARM_ORIGIN)[3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NUM_LANDMARKS, Point};

    fn landmarks(wrist: Point, middle_tip: Point) -> LandmarkSet {
        let mut points = [Point::new(0.5, 0.5); NUM_LANDMARKS];
        points[WRIST] = wrist;
        points[MIDDLE_TIP] = middle_tip;
        LandmarkSet::new(points)
    }

    #[test]
    fn centered_hand_pointing_right_is_straight_arm() {
        let pose = ArmPose::from_landmarks(&landmarks(Point::new(0.5, 0.5), Point::new(0.8, 0.5)));
        assert!(pose.shoulder.abs() < 1e-4);
        assert!(pose.elbow.abs() < 1e-4);
        assert!(pose.wrist.abs() < 1e-4);

        let (x, y) = pose.end_effector();
        assert!((x - 750.0).abs() < 1e-3);
        assert!((y - 300.0).abs() < 1e-3);
    }

    #[test]
    fn wrist_position_maps_to_shoulder_and_elbow() {
        let pose = ArmPose::from_landmarks(&landmarks(Point::new(1.0, 0.0), Point::new(1.0, 0.5)));
        assert!((pose.shoulder - 90.0).abs() < 1e-3);
        assert!((pose.elbow + 90.0).abs() < 1e-3);
        // Middle tip straight below the wrist in image space.
        assert!((pose.wrist - 90.0).abs() < 1e-3);
    }

    #[test]
    fn joints_follow_absolute_angles() {
        let pose = ArmPose {
            shoulder: 90.0,
            elbow: 0.0,
            wrist: 180.0,
        };
        let joints = pose.joints((0.0, 0.0));
        assert!((joints[1].0).abs() < 1e-3 && (joints[1].1 - 150.0).abs() < 1e-3);
        assert!((joints[2].0 - 120.0).abs() < 1e-3 && (joints[2].1 - 150.0).abs() < 1e-3);
        assert!((joints[3].0 - 40.0).abs() < 1e-3 && (joints[3].1 - 150.0).abs() < 1e-3);
    }
}
