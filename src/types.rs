use std::time::Instant;

pub const NUM_LANDMARKS: usize = 21;
pub const WRIST: usize = 0;
pub const MIDDLE_TIP: usize = 12;

/// Fingertip indices, thumb first.
pub const TIP_IDS: [usize; 5] = [4, 8, 12, 16, 20];
/// Finger base indices, in the same order as [`TIP_IDS`].
pub const BASE_IDS: [usize; 5] = [2, 5, 9, 13, 17];

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

/// A point in normalized image space, `[0, 1] x [0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// One hand's worth of keypoints. Always exactly 21 points.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    points: [Point; NUM_LANDMARKS],
}

impl LandmarkSet {
    pub fn new(points: [Point; NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    /// Builds a set from a detector's output; `None` unless exactly 21 points are given.
    pub fn from_slice(points: &[Point]) -> Option<Self> {
        let points: [Point; NUM_LANDMARKS] = points.try_into().ok()?;
        Some(Self { points })
    }

    pub fn point(&self, index: usize) -> Point {
        self.points[index]
    }

    pub fn wrist(&self) -> Point {
        self.points[WRIST]
    }

    pub fn points(&self) -> &[Point; NUM_LANDMARKS] {
        &self.points
    }

    pub fn mirrored(&self) -> Self {
        let mut points = self.points;
        for p in points.iter_mut() {
            p.x = 1.0 - p.x;
        }
        Self { points }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

/// Per-finger extension flags, thumb first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ExtensionVector(pub [bool; 5]);

impl ExtensionVector {
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&extended| extended).count()
    }

    pub fn is_extended(&self, finger: Finger) -> bool {
        self.0[finger as usize]
    }

    /// True when exactly the given fingers are extended and no others.
    pub fn is_exactly(&self, fingers: &[Finger]) -> bool {
        self.count() == fingers.len() && fingers.iter().all(|f| self.is_extended(*f))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Gesture {
    OpenPalm,
    Fist,
    ThumbsUp,
    TwoFingers,
    ThreeFingers,
    FourFingers,
    Point,
    Pinch,
    #[default]
    None,
}

impl Gesture {
    pub const ALL: [Gesture; 9] = [
        Gesture::OpenPalm,
        Gesture::Fist,
        Gesture::ThumbsUp,
        Gesture::TwoFingers,
        Gesture::ThreeFingers,
        Gesture::FourFingers,
        Gesture::Point,
        Gesture::Pinch,
        Gesture::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::OpenPalm => "open_palm",
            Gesture::Fist => "fist",
            Gesture::ThumbsUp => "thumbs_up",
            Gesture::TwoFingers => "two_fingers",
            Gesture::ThreeFingers => "three_fingers",
            Gesture::FourFingers => "four_fingers",
            Gesture::Point => "point",
            Gesture::Pinch => "pinch",
            Gesture::None => "none",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Gesture::OpenPalm => "Open Palm",
            Gesture::Fist => "Fist",
            Gesture::ThumbsUp => "Thumbs Up",
            Gesture::TwoFingers => "Two Fingers",
            Gesture::ThreeFingers => "Three Fingers",
            Gesture::FourFingers => "Four Fingers",
            Gesture::Point => "Point",
            Gesture::Pinch => "Pinch",
            Gesture::None => "No Gesture",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Gesture::OpenPalm => "all 5 fingers extended",
            Gesture::Fist => "all fingers closed",
            Gesture::ThumbsUp => "only thumb extended",
            Gesture::TwoFingers => "index and middle finger",
            Gesture::ThreeFingers => "index, middle and ring finger",
            Gesture::FourFingers => "all except thumb",
            Gesture::Point => "only index finger",
            Gesture::Pinch => "thumb and index tips close",
            Gesture::None => "no recognizable hand shape",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Gesture::OpenPalm => "🖐 ",
            Gesture::Fist => "✊ ",
            Gesture::ThumbsUp => "👍 ",
            Gesture::TwoFingers => "✌️ ",
            Gesture::ThreeFingers => "🤟 ",
            Gesture::FourFingers => "🖖 ",
            Gesture::Point => "👆 ",
            Gesture::Pinch => "🤏 ",
            Gesture::None => "⋯ ",
        }
    }
}

impl std::fmt::Display for Gesture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
