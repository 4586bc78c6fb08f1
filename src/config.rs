use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model_download::{ModelKind, default_model_path};

pub const DEFAULT_EXTENSION_THRESHOLD: f32 = 1.2;
pub const DEFAULT_PINCH_THRESHOLD: f32 = 0.05;
pub const DEFAULT_COOLDOWN_SECONDS: f32 = 1.0;
pub const DEFAULT_SMOOTHING_ALPHA: f32 = 0.7;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("extension_threshold_multiplier must be positive, got {0}")]
    ExtensionThreshold(f32),
    #[error("pinch_distance_threshold must be positive, got {0}")]
    PinchThreshold(f32),
    #[error("gesture_cooldown_seconds must be finite and not negative, got {0}")]
    Cooldown(f32),
    #[error("mouse_smoothing_alpha must be in (0, 1], got {0}")]
    SmoothingAlpha(f32),
    #[error("{name} must be in [0, 1], got {value}")]
    Confidence { name: &'static str, value: f32 },
    #[error("camera {0} must be non-zero")]
    Camera(&'static str),
}

/// Tunables of the gesture core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub extension_threshold_multiplier: f32,
    pub pinch_distance_threshold: f32,
    /// Recorded with each emission but not used to gate events.
    pub gesture_cooldown_seconds: f32,
    pub mouse_smoothing_alpha: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            extension_threshold_multiplier: DEFAULT_EXTENSION_THRESHOLD,
            pinch_distance_threshold: DEFAULT_PINCH_THRESHOLD,
            gesture_cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            mouse_smoothing_alpha: DEFAULT_SMOOTHING_ALPHA,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub handpose_model_path: PathBuf,
    pub palm_model_path: PathBuf,
    /// Minimum palm score for a region to be cropped for the estimator.
    pub palm_score_threshold: f32,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            handpose_model_path: default_model_path(ModelKind::HandposeEstimator),
            palm_model_path: default_model_path(ModelKind::PalmDetector),
            palm_score_threshold: 0.5,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Log actions instead of injecting OS input.
    pub dry_run: bool,
    /// Adds an `[announce]` log line per action. No audio.
    pub announce_actions: bool,
    pub drag_hold_ms: u64,
    pub robot_arm: bool,
    /// Flip landmarks horizontally, for selfie-view cameras.
    pub mirror: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            dry_run: !cfg!(feature = "os-input"),
            announce_actions: false,
            drag_hold_ms: 100,
            robot_arm: false,
            mirror: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gesture: GestureConfig,
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub control: ControlConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads the optional config file, then applies command-line overrides.
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(index) = args.camera {
            self.camera.index = index;
        }
        if let Some(width) = args.width {
            self.camera.width = width;
        }
        if let Some(height) = args.height {
            self.camera.height = height;
        }
        if let Some(path) = &args.model {
            self.detector.handpose_model_path = path.clone();
        }
        if let Some(path) = &args.palm_model {
            self.detector.palm_model_path = path.clone();
        }
        if let Some(value) = args.extension_threshold {
            self.gesture.extension_threshold_multiplier = value;
        }
        if let Some(value) = args.pinch_threshold {
            self.gesture.pinch_distance_threshold = value;
        }
        if let Some(value) = args.smoothing {
            self.gesture.mouse_smoothing_alpha = value;
        }
        if args.dry_run {
            self.control.dry_run = true;
        }
        if args.announce {
            self.control.announce_actions = true;
        }
        if args.robot_arm {
            self.control.robot_arm = true;
        }
        if args.mirror {
            self.control.mirror = true;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.gesture;
        if !(g.extension_threshold_multiplier > 0.0) {
            return Err(ConfigError::ExtensionThreshold(
                g.extension_threshold_multiplier,
            ));
        }
        if !(g.pinch_distance_threshold > 0.0) {
            return Err(ConfigError::PinchThreshold(g.pinch_distance_threshold));
        }
        if !(g.gesture_cooldown_seconds >= 0.0 && g.gesture_cooldown_seconds.is_finite()) {
            return Err(ConfigError::Cooldown(g.gesture_cooldown_seconds));
        }
        if !(g.mouse_smoothing_alpha > 0.0 && g.mouse_smoothing_alpha <= 1.0) {
            return Err(ConfigError::SmoothingAlpha(g.mouse_smoothing_alpha));
        }

        for (name, value) in [
            ("palm_score_threshold", self.detector.palm_score_threshold),
            (
                "min_detection_confidence",
                self.detector.min_detection_confidence,
            ),
            (
                "min_tracking_confidence",
                self.detector.min_tracking_confidence,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Confidence { name, value });
            }
        }

        if self.camera.width == 0 {
            return Err(ConfigError::Camera("width"));
        }
        if self.camera.height == 0 {
            return Err(ConfigError::Camera("height"));
        }
        if self.camera.fps == 0 {
            return Err(ConfigError::Camera("fps"));
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Default)]
#[command(name = "gesture-pilot")]
#[command(about = "Drive mouse and keyboard with webcam hand gestures")]
pub struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Camera index
    #[arg(long)]
    pub camera: Option<u32>,

    /// Requested capture width
    #[arg(long)]
    pub width: Option<u32>,

    /// Requested capture height
    #[arg(long)]
    pub height: Option<u32>,

    /// Handpose estimator ONNX model path
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Palm detector ONNX model path
    #[arg(long)]
    pub palm_model: Option<PathBuf>,

    /// Finger extension multiplier
    #[arg(long)]
    pub extension_threshold: Option<f32>,

    /// Thumb/index distance below which a pinch is reported
    #[arg(long)]
    pub pinch_threshold: Option<f32>,

    /// Mouse smoothing factor (weight of the newest sample)
    #[arg(long)]
    pub smoothing: Option<f32>,

    /// Log actions without touching mouse or keyboard
    #[arg(long)]
    pub dry_run: bool,

    /// Announce each action in the log
    #[arg(long)]
    pub announce: bool,

    /// Track the virtual robot arm pose
    #[arg(long)]
    pub robot_arm: bool,

    /// Mirror landmarks horizontally
    #[arg(long)]
    pub mirror: bool,

    /// Print the gesture guide and exit
    #[arg(long)]
    pub help_gestures: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_reference_tunables() {
        let config = AppConfig::default();
        assert_eq!(config.gesture.extension_threshold_multiplier, 1.2);
        assert_eq!(config.gesture.pinch_distance_threshold, 0.05);
        assert_eq!(config.gesture.gesture_cooldown_seconds, 1.0);
        assert_eq!(config.gesture.mouse_smoothing_alpha, 0.7);
        assert_eq!(config.detector.min_detection_confidence, 0.7);
        assert_eq!(config.detector.min_tracking_confidence, 0.5);
        assert_eq!(config.detector.palm_score_threshold, 0.5);
        assert_eq!(config.camera.width, 1280);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [gesture]
            pinch_distance_threshold = 0.08

            [camera]
            index = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.gesture.pinch_distance_threshold, 0.08);
        assert_eq!(config.gesture.extension_threshold_multiplier, 1.2);
        assert_eq!(config.camera.index, 2);
        assert_eq!(config.camera.fps, 30);
    }

    #[test]
    fn load_reads_file_and_args_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gesture]\nmouse_smoothing_alpha = 0.5\n[control]\nmirror = false").unwrap();

        let args = Args {
            config: Some(file.path().to_path_buf()),
            smoothing: Some(0.9),
            mirror: true,
            announce: true,
            palm_model: Some(PathBuf::from("custom/palm.onnx")),
            ..Args::default()
        };
        let config = AppConfig::from_args(&args).unwrap();
        assert_eq!(config.gesture.mouse_smoothing_alpha, 0.9);
        assert!(config.control.mirror);
        assert!(config.control.announce_actions);
        assert_eq!(
            config.detector.palm_model_path,
            PathBuf::from("custom/palm.onnx")
        );
    }

    #[test]
    fn load_reports_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/gesture-pilot.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn validate_rejects_unbounded_cooldown() {
        let config = AppConfig::from_toml("[gesture]\ngesture_cooldown_seconds = inf").unwrap();
        assert_eq!(config.validate(), Err(ConfigError::Cooldown(f32::INFINITY)));

        let mut config = AppConfig::default();
        config.gesture.gesture_cooldown_seconds = f32::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Cooldown(_))));

        let mut config = AppConfig::default();
        config.gesture.gesture_cooldown_seconds = 1e30;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_tunables() {
        let mut config = AppConfig::default();
        config.gesture.mouse_smoothing_alpha = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::SmoothingAlpha(0.0)));

        let mut config = AppConfig::default();
        config.gesture.extension_threshold_multiplier = -1.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ExtensionThreshold(-1.0))
        );

        let mut config = AppConfig::default();
        config.gesture.gesture_cooldown_seconds = -0.5;
        assert_eq!(config.validate(), Err(ConfigError::Cooldown(-0.5)));

        let mut config = AppConfig::default();
        config.detector.min_tracking_confidence = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Confidence {
                name: "min_tracking_confidence",
                ..
            })
        ));

        let mut config = AppConfig::default();
        config.detector.palm_score_threshold = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Confidence {
                name: "palm_score_threshold",
                ..
            })
        ));

        let mut config = AppConfig::default();
        config.camera.fps = 0;
        assert_eq!(config.validate(), Err(ConfigError::Camera("fps")));
    }
}
