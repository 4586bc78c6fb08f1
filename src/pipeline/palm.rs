use std::{f32::consts::FRAC_PI_2, path::Path};

use anyhow::{Context, Result, anyhow};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::Tensor,
};

use super::crop::{Letterbox, letterbox};
use crate::types::Frame;

pub const PALM_INPUT_SIZE: u32 = 192;
pub const PALM_LANDMARKS: usize = 7;
const FEATURES: usize = 4 + PALM_LANDMARKS * 2;
const NMS_THRESHOLD: f32 = 0.3;
const TOP_K: usize = 32;
// Crops smaller than this, in frame pixels, lose the fingers.
const MIN_CROP_SIDE: f32 = 80.0;
const CROP_EXPANSION: f32 = 2.4;

/// A detected palm, in frame pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct PalmRegion {
    /// `[x1, y1, x2, y2]`
    pub bbox: [f32; 4],
    pub landmarks: [(f32, f32); PALM_LANDMARKS],
    pub score: f32,
}

/// SSD anchor centers of the 192x192 palm model: 24x24 cells with 2 anchors
/// (stride 8) followed by 12x12 cells with 6 anchors (three stride-16 layers).
pub fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(2016);
    for (stride, per_cell) in [(8u32, 2usize), (16, 6)] {
        let cells = PALM_INPUT_SIZE.div_ceil(stride);
        for y in 0..cells {
            for x in 0..cells {
                let center = [
                    (x as f32 + 0.5) / cells as f32,
                    (y as f32 + 0.5) / cells as f32,
                ];
                anchors.extend(std::iter::repeat_n(center, per_cell));
            }
        }
    }
    anchors
}

pub struct PalmDetector {
    session: Session,
    anchors: Vec<[f32; 2]>,
    score_threshold: f32,
}

impl PalmDetector {
    pub fn load(model_path: &Path, score_threshold: f32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load palm detector from {}", model_path.display())
            })?;

        Ok(Self {
            session,
            anchors: generate_anchors(),
            score_threshold,
        })
    }

    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = letterbox(frame, PALM_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run palm detector session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "palm detector returned {} outputs, need boxes and scores",
                outputs.len()
            ));
        }

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let scores: Vec<f32> = scores.iter().copied().collect();

        decode_palms(
            &boxes,
            &scores,
            &self.anchors,
            &letterbox,
            self.score_threshold,
        )
    }
}

/// Decodes raw `[anchors, 18]` boxes and `[anchors, 1]` logits into palm
/// regions, best first, with overlapping boxes suppressed.
pub fn decode_palms(
    boxes: &[f32],
    scores: &[f32],
    anchors: &[[f32; 2]],
    letterbox: &Letterbox,
    score_threshold: f32,
) -> Result<Vec<PalmRegion>> {
    let count = anchors.len().min(scores.len());
    if boxes.len() < count * FEATURES {
        return Err(anyhow!(
            "palm boxes too short: got {}, need {} for {count} anchors",
            boxes.len(),
            count * FEATURES
        ));
    }

    let input = PALM_INPUT_SIZE as f32;
    let scale = letterbox.orig_w.max(letterbox.orig_h) as f32;
    let pad_x = letterbox.pad_x / letterbox.scale;
    let pad_y = letterbox.pad_y / letterbox.scale;
    let to_frame = |x: f32, y: f32, anchor: [f32; 2]| {
        (
            (x / input + anchor[0]) * scale - pad_x,
            (y / input + anchor[1]) * scale - pad_y,
        )
    };
    let max_x = letterbox.orig_w.saturating_sub(1) as f32;
    let max_y = letterbox.orig_h.saturating_sub(1) as f32;

    let mut candidates = Vec::new();
    for (i, &anchor) in anchors.iter().enumerate().take(count) {
        let score = sigmoid(scores[i]);
        if score < score_threshold {
            continue;
        }

        let f = &boxes[i * FEATURES..(i + 1) * FEATURES];
        let (cx, cy) = to_frame(f[0], f[1], anchor);
        let half_w = f[2] / input * scale / 2.0;
        let half_h = f[3] / input * scale / 2.0;
        if half_w <= 0.0 || half_h <= 0.0 {
            continue;
        }

        let bbox = [
            (cx - half_w).clamp(0.0, max_x),
            (cy - half_h).clamp(0.0, max_y),
            (cx + half_w).clamp(0.0, max_x),
            (cy + half_h).clamp(0.0, max_y),
        ];
        let landmarks =
            std::array::from_fn(|l| to_frame(f[4 + l * 2], f[5 + l * 2], anchor));

        candidates.push(PalmRegion {
            bbox,
            landmarks,
            score,
        });
    }

    Ok(non_max_suppression(candidates))
}

fn non_max_suppression(mut candidates: Vec<PalmRegion>) -> Vec<PalmRegion> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<PalmRegion> = Vec::new();
    for candidate in candidates {
        if kept
            .iter()
            .any(|k| iou(&k.bbox, &candidate.bbox) >= NMS_THRESHOLD)
        {
            continue;
        }
        kept.push(candidate);
        if kept.len() >= TOP_K {
            break;
        }
    }
    kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

pub fn pick_primary_region(regions: &[PalmRegion]) -> Option<&PalmRegion> {
    regions.iter().max_by(|a, b| a.score.total_cmp(&b.score))
}

/// Square crop around the palm, large enough to hold the fingers:
/// `(center, side, angle)` in frame pixels and radians.
pub fn crop_from_palm(region: &PalmRegion) -> ((f32, f32), f32, f32) {
    let n = PALM_LANDMARKS as f32;
    let (sum_x, sum_y) = region
        .landmarks
        .iter()
        .fold((0.0, 0.0), |acc, p| (acc.0 + p.0, acc.1 + p.1));
    let center = (sum_x / n, sum_y / n);

    let (min_x, max_x, min_y, max_y) = region.landmarks.iter().fold(
        (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
        |acc, &(x, y)| (acc.0.min(x), acc.1.max(x), acc.2.min(y), acc.3.max(y)),
    );
    let span = (max_x - min_x).max(max_y - min_y);
    let box_w = (region.bbox[2] - region.bbox[0]).abs();
    let box_h = (region.bbox[3] - region.bbox[1]).abs();
    let side = box_w.max(box_h).max(span).max(MIN_CROP_SIDE) * CROP_EXPANSION;

    (center, side, estimate_orientation(region, center))
}

/// Principal axis of the palm keypoints, turned so the hand points up in the crop.
fn estimate_orientation(region: &PalmRegion, mean: (f32, f32)) -> f32 {
    let n = PALM_LANDMARKS as f32;
    let (mut xx, mut xy, mut yy) = (0.0, 0.0, 0.0);
    for &(x, y) in &region.landmarks {
        let dx = x - mean.0;
        let dy = y - mean.1;
        xx += dx * dx;
        xy += dx * dy;
        yy += dy * dy;
    }
    let (xx, xy, yy) = (xx / n, xy / n, yy / n);

    let half_trace = (xx + yy) * 0.5;
    let det = xx * yy - xy * xy;
    let lambda = (half_trace + (half_trace * half_trace - det).max(0.0).sqrt()).max(1e-6);
    let (vx, vy) = if xy.abs() > 1e-6 {
        (lambda - yy, xy)
    } else if xx >= yy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };

    vy.atan2(vx) - FRAC_PI_2
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRIDE16_START: usize = 24 * 24 * 2;

    fn square_letterbox() -> Letterbox {
        Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            orig_w: 192,
            orig_h: 192,
        }
    }

    /// Raw outputs where only the given anchors fire, each with a 40 px box
    /// centered on its anchor.
    fn raw_outputs(anchors: &[[f32; 2]], firing: &[(usize, f32)]) -> (Vec<f32>, Vec<f32>) {
        let mut boxes = vec![0.0; anchors.len() * FEATURES];
        let mut scores = vec![-10.0; anchors.len()];
        for &(i, logit) in firing {
            scores[i] = logit;
            boxes[i * FEATURES + 2] = 40.0;
            boxes[i * FEATURES + 3] = 40.0;
        }
        (boxes, scores)
    }

    fn region(landmarks: [(f32, f32); PALM_LANDMARKS], bbox: [f32; 4]) -> PalmRegion {
        PalmRegion {
            bbox,
            landmarks,
            score: 0.9,
        }
    }

    #[test]
    fn anchor_grid_matches_model_layout() {
        let anchors = generate_anchors();
        assert_eq!(anchors.len(), 2016);
        assert_eq!(anchors[0], [0.5 / 24.0, 0.5 / 24.0]);
        assert_eq!(anchors[1], anchors[0]);
        assert_eq!(anchors[STRIDE16_START], [0.5 / 12.0, 0.5 / 12.0]);
        assert_eq!(anchors[2015], [11.5 / 12.0, 11.5 / 12.0]);
    }

    #[test]
    fn decodes_box_around_its_anchor() {
        let anchors = generate_anchors();
        // Cell (6, 6) of the stride-16 grid, centered at 104 px.
        let idx = STRIDE16_START + (6 * 12 + 6) * 6;
        let (boxes, scores) = raw_outputs(&anchors, &[(idx, 3.0)]);

        let palms = decode_palms(&boxes, &scores, &anchors, &square_letterbox(), 0.5).unwrap();
        assert_eq!(palms.len(), 1);
        let palm = &palms[0];
        assert!((palm.score - sigmoid(3.0)).abs() < 1e-6);
        for (got, want) in palm.bbox.iter().zip([84.0, 84.0, 124.0, 124.0]) {
            assert!((got - want).abs() < 1e-3, "{:?}", palm.bbox);
        }
        assert!((palm.landmarks[0].0 - 104.0).abs() < 1e-3);
    }

    #[test]
    fn letterbox_padding_is_removed() {
        let anchors = generate_anchors();
        let letterbox = Letterbox {
            scale: 0.5,
            pad_x: 0.0,
            pad_y: 48.0,
            orig_w: 384,
            orig_h: 192,
        };
        let mut boxes = vec![0.0; anchors.len() * FEATURES];
        let idx = STRIDE16_START + (6 * 12 + 6) * 6;
        boxes[idx * FEATURES + 2] = 10.0;
        boxes[idx * FEATURES + 3] = 10.0;
        let mut scores = vec![-10.0; anchors.len()];
        scores[idx] = 4.0;

        let palms = decode_palms(&boxes, &scores, &anchors, &letterbox, 0.5).unwrap();
        let (x, y) = palms[0].landmarks[3];
        // 6.5 / 12 of the 384 px padded square, minus 96 px of top padding.
        assert!((x - 208.0).abs() < 1e-3);
        assert!((y - 112.0).abs() < 1e-3);
    }

    #[test]
    fn low_scores_and_overlaps_are_dropped() {
        let anchors = generate_anchors();
        let idx = STRIDE16_START + (3 * 12 + 3) * 6;
        let far = STRIDE16_START + (9 * 12 + 9) * 6;
        let (boxes, scores) =
            raw_outputs(&anchors, &[(idx, 2.0), (idx + 1, 3.0), (far, 1.0), (far + 1, -1.0)]);

        let palms = decode_palms(&boxes, &scores, &anchors, &square_letterbox(), 0.5).unwrap();
        assert_eq!(palms.len(), 2);
        assert!((palms[0].score - sigmoid(3.0)).abs() < 1e-6);
        assert!((palms[1].score - sigmoid(1.0)).abs() < 1e-6);
        assert_eq!(pick_primary_region(&palms), Some(&palms[0]));
    }

    #[test]
    fn short_box_output_is_an_error() {
        let anchors = generate_anchors();
        let scores = vec![0.0; anchors.len()];
        assert!(decode_palms(&[0.0; 10], &scores, &anchors, &square_letterbox(), 0.5).is_err());
    }

    #[test]
    fn crop_covers_the_palm_generously() {
        let vertical = std::array::from_fn(|i| (100.0, 80.0 + i as f32 * 10.0));
        let (center, side, angle) = crop_from_palm(&region(vertical, [90.0, 70.0, 110.0, 150.0]));
        assert!((center.0 - 100.0).abs() < 1e-3 && (center.1 - 110.0).abs() < 1e-3);
        assert!((side - 80.0 * CROP_EXPANSION).abs() < 1e-3);
        assert!(angle.abs() < 1e-4);

        let horizontal = std::array::from_fn(|i| (50.0 + i as f32 * 30.0, 100.0));
        let (_, side, angle) = crop_from_palm(&region(horizontal, [50.0, 90.0, 230.0, 110.0]));
        assert!((side - 180.0 * CROP_EXPANSION).abs() < 1e-3);
        assert!((angle + FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn no_palms_no_primary() {
        assert!(pick_primary_region(&[]).is_none());
    }
}
