use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::Tensor,
};

use super::{
    LandmarkSource,
    crop::{CropTransform, rotated_crop},
    palm::{PalmDetector, crop_from_palm, pick_primary_region},
};
use crate::{
    config::DetectorConfig,
    model_download::{ModelKind, ensure_model_ready},
    types::{Frame, LandmarkSet, NUM_LANDMARKS, Point},
};

pub const INPUT_SIZE: u32 = 224;

/// Turns the estimator's flat `x, y, z` triples, in crop pixels, into a
/// landmark set normalized to the whole frame.
pub fn decode_landmarks(flat: &[f32], crop: &CropTransform) -> Result<LandmarkSet> {
    if flat.len() < NUM_LANDMARKS * 3 {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            NUM_LANDMARKS * 3
        ));
    }

    let points: Vec<Point> = flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|c| crop.to_normalized(c[0], c[1]))
        .collect();
    LandmarkSet::from_slice(&points).ok_or_else(|| anyhow!("expected {NUM_LANDMARKS} landmarks"))
}

/// Hand confidence: the estimator's own score weighted by the palm score
/// that produced its crop.
pub fn hand_score(estimator_score: f32, palm_score: f32) -> f32 {
    (estimator_score * palm_score).clamp(0.0, 1.0)
}

/// Detection/tracking hysteresis: a new hand needs the higher score, a
/// tracked one is kept down to the lower score.
#[derive(Clone, Copy, Debug)]
pub struct ConfidenceGate {
    min_detection: f32,
    min_tracking: f32,
    tracking: bool,
}

impl ConfidenceGate {
    pub fn new(min_detection: f32, min_tracking: f32) -> Self {
        Self {
            min_detection,
            min_tracking,
            tracking: false,
        }
    }

    pub fn admit(&mut self, score: f32) -> bool {
        let threshold = if self.tracking {
            self.min_tracking
        } else {
            self.min_detection
        };
        self.tracking = score >= threshold;
        self.tracking
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }
}

/// MediaPipe two-stage hand pipeline on ONNX Runtime: the palm detector finds
/// the hand, the handpose estimator runs on a rotated crop around it.
pub struct HandposeDetector {
    palm: PalmDetector,
    estimator: Session,
    gate: ConfidenceGate,
    mirror: bool,
}

impl HandposeDetector {
    /// Downloads missing models, then loads both.
    pub fn open(config: &DetectorConfig, mirror: bool) -> Result<Self> {
        ensure_model_ready(ModelKind::PalmDetector, &config.palm_model_path, |_evt| {})?;
        ensure_model_ready(
            ModelKind::HandposeEstimator,
            &config.handpose_model_path,
            |_evt| {},
        )?;

        let detector = Self {
            palm: PalmDetector::load(&config.palm_model_path, config.palm_score_threshold)?,
            estimator: load_estimator(&config.handpose_model_path)?,
            gate: ConfidenceGate::new(
                config.min_detection_confidence,
                config.min_tracking_confidence,
            ),
            mirror,
        };
        log::info!(
            "hand models ready using {} and palm detector {}",
            config.handpose_model_path.display(),
            config.palm_model_path.display()
        );
        Ok(detector)
    }

    /// Feeds a score through the gate, logging when a tracked hand is lost.
    fn admit(gate: &mut ConfidenceGate, score: f32) -> bool {
        let was_tracking = gate.is_tracking();
        let admitted = gate.admit(score);
        if was_tracking && !admitted {
            log::debug!("hand lost (score {score:.2})");
        }
        admitted
    }
}

fn load_estimator(model_path: &Path) -> Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(2)?
        .commit_from_file(model_path)
        .with_context(|| format!("failed to load ORT session from {}", model_path.display()))
}

impl LandmarkSource for HandposeDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>> {
        let regions = self.palm.detect(frame).unwrap_or_else(|err| {
            log::warn!("palm detection failed: {err:?}");
            Vec::new()
        });
        let Some(region) = pick_primary_region(&regions) else {
            Self::admit(&mut self.gate, 0.0);
            return Ok(None);
        };
        let palm_score = region.score;
        let (center, side, angle) = crop_from_palm(region);

        let (input, crop) = rotated_crop(frame, center, side, angle, INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .estimator
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "handpose model returned {} outputs, need landmarks and score",
                outputs.len()
            ));
        }

        let estimator_score = outputs[1]
            .try_extract_array::<f32>()?
            .iter()
            .next()
            .copied()
            .unwrap_or(0.0);
        if !Self::admit(&mut self.gate, hand_score(estimator_score, palm_score)) {
            return Ok(None);
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flat: Vec<f32> = coords.iter().copied().collect();
        let landmarks = decode_landmarks(&flat, &crop)?;

        Ok(Some(if self.mirror {
            landmarks.mirrored()
        } else {
            landmarks
        }))
    }
}
