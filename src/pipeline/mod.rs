#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod crop;
pub mod handpose;
pub mod palm;
#[cfg(feature = "camera-nokhwa")]
pub mod rgb_converter;

use anyhow::Result;

use crate::types::{Frame, LandmarkSet};

#[cfg(feature = "camera-nokhwa")]
pub use camera::CameraCapture;
pub use handpose::HandposeDetector;

/// Blocking frame producer. An error ends the stream.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame>;

    /// Releases the device. Must be safe to call more than once.
    fn close(&mut self) {}
}

/// Per-frame hand detector: zero or one hand of normalized keypoints.
pub trait LandmarkSource {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>>;
}
