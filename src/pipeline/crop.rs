use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, Point};

/// How a frame was fitted into a square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

fn check_frame(frame: &Frame) -> Result<()> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(3);
    if frame.width == 0 || frame.height == 0 || frame.rgb.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {} bytes for {}x{}",
            frame.rgb.len(),
            frame.width,
            frame.height
        ));
    }
    Ok(())
}

/// Resizes the frame to fit `target` x `target` keeping aspect ratio, pads
/// with black and converts to NHWC floats in `[0, 1]`.
pub fn letterbox(frame: &Frame, target: u32) -> Result<(Array4<f32>, Letterbox)> {
    check_frame(frame)?;

    let scale = target as f32 / frame.width.max(frame.height) as f32;
    let new_w = ((frame.width as f32 * scale).round() as u32).clamp(1, target);
    let new_h = ((frame.height as f32 * scale).round() as u32).clamp(1, target);

    let src = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgb.clone(),
        fir::PixelType::U8x3,
    )?;
    let mut dst = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x3);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .context("frame resize failed")?;
    let resized = dst.into_vec();

    let pad_x = ((target - new_w) / 2) as usize;
    let pad_y = ((target - new_h) / 2) as usize;
    let side = target as usize;
    let row_len = new_w as usize * 3;

    let mut canvas = vec![0u8; side * side * 3];
    for (row, src_row) in resized.chunks_exact(row_len).enumerate() {
        let offset = ((pad_y + row) * side + pad_x) * 3;
        canvas[offset..offset + row_len].copy_from_slice(src_row);
    }

    let normalized: Vec<f32> = canvas.par_iter().map(|&v| v as f32 / 255.0).collect();
    let input = Array4::from_shape_vec((1, side, side, 3), normalized)
        .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    Ok((
        input,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            orig_w: frame.width,
            orig_h: frame.height,
        },
    ))
}

/// A square, rotated window of the frame sampled into a model input.
///
/// `center` and `side` are in frame pixels, `angle` in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropTransform {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
    pub output_size: u32,
    pub orig_w: u32,
    pub orig_h: u32,
}

impl CropTransform {
    /// Model-input pixel to frame pixel, clamped to the frame.
    pub fn project(&self, x: f32, y: f32) -> (f32, f32) {
        let half = self.output_size as f32 / 2.0;
        let scale = self.side / self.output_size as f32;
        let dx = (x - half) * scale;
        let dy = (y - half) * scale;
        let (sin, cos) = self.angle.sin_cos();
        let ox = self.center.0 + dx * cos - dy * sin;
        let oy = self.center.1 + dx * sin + dy * cos;
        (
            ox.clamp(0.0, self.orig_w.saturating_sub(1) as f32),
            oy.clamp(0.0, self.orig_h.saturating_sub(1) as f32),
        )
    }

    /// Model-input pixel to normalized frame coordinates.
    pub fn to_normalized(&self, x: f32, y: f32) -> Point {
        let (px, py) = self.project(x, y);
        Point::new(
            px / self.orig_w.max(1) as f32,
            py / self.orig_h.max(1) as f32,
        )
    }
}

/// Samples the rotated square around `center` into an
/// `output_size` x `output_size` NHWC tensor. Pixels outside the frame are black.
pub fn rotated_crop(
    frame: &Frame,
    center: (f32, f32),
    side: f32,
    angle: f32,
    output_size: u32,
) -> Result<(Array4<f32>, CropTransform)> {
    check_frame(frame)?;

    let transform = CropTransform {
        center,
        side,
        angle,
        output_size,
        orig_w: frame.width,
        orig_h: frame.height,
    };
    let half = output_size as f32 / 2.0;
    let scale = side / output_size as f32;
    let (sin, cos) = angle.sin_cos();

    let data: Vec<f32> = (0..output_size)
        .into_par_iter()
        .flat_map_iter(|y| {
            let dy = (y as f32 + 0.5 - half) * scale;
            (0..output_size).flat_map(move |x| {
                let dx = (x as f32 + 0.5 - half) * scale;
                sample_rgb(
                    frame,
                    center.0 + dx * cos - dy * sin,
                    center.1 + dx * sin + dy * cos,
                )
            })
        })
        .collect();

    let size = output_size as usize;
    let input = Array4::from_shape_vec((1, size, size, 3), data)
        .map_err(|err| anyhow!("failed to build rotated crop tensor: {err}"))?;
    Ok((input, transform))
}

/// Bilinear sample at a sub-pixel position, as `[0, 1]` floats.
fn sample_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if !x.is_finite() || !y.is_finite() {
        return [0.0; 3];
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let fetch = |cx: f32, cy: f32| -> [f32; 3] {
        if cx < 0.0 || cy < 0.0 || cx >= frame.width as f32 || cy >= frame.height as f32 {
            return [0.0; 3];
        }
        let idx = (cy as usize * frame.width as usize + cx as usize) * 3;
        match frame.rgb.get(idx..idx + 3) {
            Some(px) => [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ],
            None => [0.0; 3],
        }
    };

    let c00 = fetch(x0, y0);
    let c10 = fetch(x0 + 1.0, y0);
    let c01 = fetch(x0, y0 + 1.0);
    let c11 = fetch(x0 + 1.0, y0 + 1.0);
    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    std::array::from_fn(|c| {
        lerp(lerp(c00[c], c10[c], fx), lerp(c01[c], c11[c], fx), fy)
    })
}

#[cfg(test)]
mod tests {
    use std::{f32::consts::FRAC_PI_2, time::Instant};

    use super::*;

    fn solid_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame {
            rgb: vec![value; (width * height * 3) as usize],
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn letterbox_pads_the_short_side() {
        let (input, letterbox) = letterbox(&solid_frame(4, 2, 255), 8).unwrap();
        assert_eq!(input.shape(), &[1, 8, 8, 3]);
        assert_eq!(letterbox.scale, 2.0);
        assert_eq!(letterbox.pad_x, 0.0);
        assert_eq!(letterbox.pad_y, 2.0);
        // Padding rows are black, content rows are white.
        assert_eq!(input[[0, 0, 0, 0]], 0.0);
        assert_eq!(input[[0, 7, 7, 2]], 0.0);
        assert!(input[[0, 4, 4, 1]] > 0.95);
    }

    #[test]
    fn letterbox_rejects_mismatched_buffer() {
        let mut frame = solid_frame(4, 4, 0);
        frame.rgb.truncate(10);
        assert!(letterbox(&frame, 8).is_err());
        assert!(rotated_crop(&frame, (2.0, 2.0), 4.0, 0.0, 8).is_err());
    }

    #[test]
    fn crop_center_projects_to_crop_center() {
        let transform = CropTransform {
            center: (100.0, 60.0),
            side: 50.0,
            angle: 0.7,
            output_size: 224,
            orig_w: 320,
            orig_h: 240,
        };
        let (x, y) = transform.project(112.0, 112.0);
        assert!((x - 100.0).abs() < 1e-3 && (y - 60.0).abs() < 1e-3);

        let p = transform.to_normalized(112.0, 112.0);
        assert!((p.x - 100.0 / 320.0).abs() < 1e-5);
        assert!((p.y - 0.25).abs() < 1e-5);
    }

    #[test]
    fn crop_projection_follows_rotation() {
        let straight = CropTransform {
            center: (100.0, 100.0),
            side: 100.0,
            angle: 0.0,
            output_size: 200,
            orig_w: 400,
            orig_h: 400,
        };
        // Top-left of the input maps to top-left of the window.
        let (x, y) = straight.project(0.0, 0.0);
        assert!((x - 50.0).abs() < 1e-3 && (y - 50.0).abs() < 1e-3);

        let turned = CropTransform {
            angle: FRAC_PI_2,
            ..straight
        };
        // A quarter turn sends the input's +x axis down the frame's +y axis.
        let (x, y) = turned.project(200.0, 100.0);
        assert!((x - 100.0).abs() < 1e-3 && (y - 150.0).abs() < 1e-3);
    }

    #[test]
    fn rotated_crop_samples_inside_and_blacks_out_outside() {
        let frame = solid_frame(20, 20, 255);
        let (input, transform) = rotated_crop(&frame, (10.0, 10.0), 10.0, 0.3, 8).unwrap();
        assert_eq!(input.shape(), &[1, 8, 8, 3]);
        assert_eq!(transform.orig_w, 20);
        assert!((input[[0, 4, 4, 0]] - 1.0).abs() < 1e-5);

        let (input, _) = rotated_crop(&frame, (0.0, 0.0), 20.0, 0.0, 8).unwrap();
        assert_eq!(input[[0, 0, 0, 0]], 0.0);
        assert!((input[[0, 6, 6, 2]] - 1.0).abs() < 1e-5);
    }
}
