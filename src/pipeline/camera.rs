use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};

use super::{FrameSource, rgb_converter};
use crate::{config::CameraConfig, types::Frame};

// Built-in macOS cameras often reject YUYV even though nokhwa reports it.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::MJPEG,
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::GRAY,
];

// Undecodable frames in a row before the stream is considered dead.
const MAX_DECODE_FAILURES: u32 = 30;

fn requested_formats(config: &CameraConfig) -> [RequestedFormat<'static>; 3] {
    let wanted = CameraFormat::new(
        Resolution::new(config.width, config.height),
        FrameFormat::MJPEG,
        config.fps,
    );
    [
        RequestedFormat::with_formats(
            RequestedFormatType::Closest(wanted),
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

/// Synchronous webcam reader; the stream is stopped on `close` or drop.
pub struct CameraCapture {
    camera: Option<Camera>,
    decode_failures: u32,
}

impl CameraCapture {
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let index = CameraIndex::Index(config.index);
        let mut last_err = None;

        for requested in requested_formats(config) {
            match Camera::new(index.clone(), requested) {
                Ok(mut camera) => match camera.open_stream() {
                    Ok(()) => {
                        let format = camera.camera_format();
                        log::info!(
                            "camera {} opened at {}x{} {:?} @ {} fps",
                            config.index,
                            format.width(),
                            format.height(),
                            format.format(),
                            format.frame_rate()
                        );
                        return Ok(Self {
                            camera: Some(camera),
                            decode_failures: 0,
                        });
                    }
                    Err(err) => last_err = Some(err.into()),
                },
                Err(err) => last_err = Some(err.into()),
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("no supported format")))
            .with_context(|| format!("failed to open camera {}", config.index))
    }
}

impl FrameSource for CameraCapture {
    fn next_frame(&mut self) -> Result<Frame> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| anyhow!("camera already closed"))?;

        loop {
            let buffer = camera.frame().context("camera frame read failed")?;
            match rgb_converter::convert_camera_frame(&buffer) {
                Ok(converted) => {
                    self.decode_failures = 0;
                    return Ok(Frame {
                        rgb: converted.rgb,
                        width: converted.width,
                        height: converted.height,
                        timestamp: Instant::now(),
                    });
                }
                Err(err) => {
                    self.decode_failures += 1;
                    log::warn!("failed to decode camera frame: {err:?}");
                    if self.decode_failures >= MAX_DECODE_FAILURES {
                        return Err(err.context("camera keeps producing undecodable frames"));
                    }
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(err) = camera.stop_stream() {
                log::warn!("failed to stop camera stream: {err:?}");
            }
            log::info!("camera released");
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.close();
    }
}
