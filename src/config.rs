use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::capture::CameraConfig;
use crate::servo::ServoConfig;
use crate::tracker::Gains;

const DEFAULT_TARGET_CLASS: u32 = 4; // bottle
const DEFAULT_CAMERA_DEVICE: &str = "stub://camera";
const DEFAULT_CAMERA_FPS: u32 = 15;
const DEFAULT_CAMERA_WIDTH: u32 = 320;
const DEFAULT_CAMERA_HEIGHT: u32 = 240;
const DEFAULT_PWM_FREQUENCY_HZ: u32 = 50;
const DEFAULT_PAN_CHANNEL: &str = "stub://pan";
const DEFAULT_TILT_CHANNEL: &str = "stub://tilt";
const DEFAULT_PAN_MIN_DUTY: f32 = 2.8;
const DEFAULT_PAN_MAX_DUTY: f32 = 11.5;
const DEFAULT_TILT_MIN_DUTY: f32 = 7.0;
const DEFAULT_TILT_MAX_DUTY: f32 = 11.5;
const DEFAULT_INITIAL_POSITION: f32 = 0.5;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.05;
const DEFAULT_IOU_THRESHOLD: f32 = 0.3;
/// Anchor geometry calibrated for the original VOC-20 model, as flat
/// (w, h) pairs in grid units.
const DEFAULT_ANCHORS: [f32; 10] = [
    1.08, 1.19, 3.42, 4.41, 6.63, 11.38, 9.42, 5.11, 16.62, 10.52,
];

#[derive(Debug, Deserialize, Default)]
struct TurretConfigFile {
    target_class: Option<u32>,
    camera: Option<CameraConfigFile>,
    servos: Option<ServosConfigFile>,
    gains: Option<GainsConfigFile>,
    inference: Option<InferenceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ServosConfigFile {
    frequency_hz: Option<u32>,
    pan: Option<AxisConfigFile>,
    tilt: Option<AxisConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct AxisConfigFile {
    channel: Option<String>,
    min_duty: Option<f32>,
    max_duty: Option<f32>,
    initial_position: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct GainsConfigFile {
    pan: Option<f32>,
    tilt: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct InferenceConfigFile {
    model_path: Option<PathBuf>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    /// Flat list of (w, h) anchor pairs.
    anchors: Option<Vec<f32>>,
}

/// Full daemon configuration, fixed at startup and never reloaded.
#[derive(Debug, Clone)]
pub struct TurretConfig {
    pub target_class: u32,
    pub camera: CameraConfig,
    pub servos: ServoSettings,
    pub gains: Gains,
    pub inference: InferenceSettings,
}

/// Per-mount servo calibration: one PWM frequency shared across axes,
/// one channel binding and duty range per axis.
#[derive(Debug, Clone)]
pub struct ServoSettings {
    pub frequency_hz: u32,
    pub pan: AxisSettings,
    pub tilt: AxisSettings,
}

#[derive(Debug, Clone)]
pub struct AxisSettings {
    pub channel: String,
    pub min_duty: f32,
    pub max_duty: f32,
    pub initial_position: f32,
}

impl AxisSettings {
    /// Servo-level config for this axis.
    pub fn servo_config(&self, frequency_hz: u32) -> ServoConfig {
        ServoConfig {
            frequency_hz,
            min_duty: self.min_duty,
            max_duty: self.max_duty,
            initial_position: self.initial_position,
        }
    }
}

/// Inference engine parameters, passed through once at initialization.
#[derive(Debug, Clone)]
pub struct InferenceSettings {
    /// ONNX model path; absent means the synthetic engine.
    pub model_path: Option<PathBuf>,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub anchors: Vec<(f32, f32)>,
}

impl TurretConfig {
    /// Load configuration: file named by `TURRET_CONFIG` (JSON), then
    /// env overrides, then validation.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from an explicit path. Without one, the file
    /// named by `TURRET_CONFIG` is used; without either, defaults.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("TURRET_CONFIG").ok().map(PathBuf::from);
        let file_cfg = match path.or(env_path.as_deref()) {
            Some(path) => read_config_file(path)?,
            None => TurretConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TurretConfigFile) -> Result<Self> {
        let target_class = file.target_class.unwrap_or(DEFAULT_TARGET_CLASS);

        let camera = CameraConfig {
            device: file
                .camera
                .as_ref()
                .and_then(|camera| camera.device.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };

        let servos_file = file.servos.unwrap_or_default();
        let servos = ServoSettings {
            frequency_hz: servos_file.frequency_hz.unwrap_or(DEFAULT_PWM_FREQUENCY_HZ),
            pan: axis_settings(
                servos_file.pan,
                DEFAULT_PAN_CHANNEL,
                DEFAULT_PAN_MIN_DUTY,
                DEFAULT_PAN_MAX_DUTY,
            ),
            tilt: axis_settings(
                servos_file.tilt,
                DEFAULT_TILT_CHANNEL,
                DEFAULT_TILT_MIN_DUTY,
                DEFAULT_TILT_MAX_DUTY,
            ),
        };

        let default_gains = Gains::default();
        let gains = Gains {
            pan: file
                .gains
                .as_ref()
                .and_then(|gains| gains.pan)
                .unwrap_or(default_gains.pan),
            tilt: file
                .gains
                .as_ref()
                .and_then(|gains| gains.tilt)
                .unwrap_or(default_gains.tilt),
        };

        let inference_file = file.inference.unwrap_or_default();
        let anchors = pair_anchors(
            inference_file
                .anchors
                .unwrap_or_else(|| DEFAULT_ANCHORS.to_vec()),
        )?;
        let inference = InferenceSettings {
            model_path: inference_file.model_path,
            confidence_threshold: inference_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            iou_threshold: inference_file
                .iou_threshold
                .unwrap_or(DEFAULT_IOU_THRESHOLD),
            anchors,
        };

        Ok(Self {
            target_class,
            camera,
            servos,
            gains,
            inference,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(class) = std::env::var("TURRET_TARGET_CLASS") {
            self.target_class = class
                .trim()
                .parse()
                .map_err(|_| anyhow!("TURRET_TARGET_CLASS must be an integer class id"))?;
        }
        if let Ok(device) = std::env::var("TURRET_CAMERA") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(model) = std::env::var("TURRET_MODEL") {
            if !model.trim().is_empty() {
                self.inference.model_path = Some(PathBuf::from(model));
            }
        }
        if let Ok(gain) = std::env::var("TURRET_PAN_GAIN") {
            self.gains.pan = gain
                .trim()
                .parse()
                .map_err(|_| anyhow!("TURRET_PAN_GAIN must be a number"))?;
        }
        if let Ok(gain) = std::env::var("TURRET_TILT_GAIN") {
            self.gains.tilt = gain
                .trim()
                .parse()
                .map_err(|_| anyhow!("TURRET_TILT_GAIN must be a number"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        if self.servos.frequency_hz == 0 {
            return Err(anyhow!("PWM frequency must be non-zero"));
        }
        for (axis, settings) in [("pan", &self.servos.pan), ("tilt", &self.servos.tilt)] {
            if !(settings.min_duty < settings.max_duty) {
                return Err(anyhow!(
                    "{} duty range is invalid: min {} must be below max {}",
                    axis,
                    settings.min_duty,
                    settings.max_duty
                ));
            }
        }
        if !self.gains.pan.is_finite() || !self.gains.tilt.is_finite() {
            return Err(anyhow!("gains must be finite"));
        }
        for (name, value) in [
            ("confidence_threshold", self.inference.confidence_threshold),
            ("iou_threshold", self.inference.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1]", name));
            }
        }
        if self.inference.anchors.is_empty() {
            return Err(anyhow!("at least one anchor pair is required"));
        }
        Ok(())
    }
}

fn axis_settings(
    file: Option<AxisConfigFile>,
    default_channel: &str,
    default_min: f32,
    default_max: f32,
) -> AxisSettings {
    let file = file.unwrap_or_default();
    AxisSettings {
        channel: file
            .channel
            .unwrap_or_else(|| default_channel.to_string()),
        min_duty: file.min_duty.unwrap_or(default_min),
        max_duty: file.max_duty.unwrap_or(default_max),
        initial_position: file.initial_position.unwrap_or(DEFAULT_INITIAL_POSITION),
    }
}

fn pair_anchors(flat: Vec<f32>) -> Result<Vec<(f32, f32)>> {
    if flat.len() % 2 != 0 {
        return Err(anyhow!(
            "anchors must be an even-length list of (w, h) pairs, got {} values",
            flat.len()
        ));
    }
    Ok(flat.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect())
}

fn read_config_file(path: &Path) -> Result<TurretConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_calibration() -> Result<()> {
        let cfg = TurretConfig::from_file(TurretConfigFile::default())?;
        assert_eq!(cfg.target_class, 4);
        assert_eq!(cfg.camera.width, 320);
        assert_eq!(cfg.camera.height, 240);
        assert_eq!(cfg.servos.frequency_hz, 50);
        assert_eq!(cfg.servos.pan.min_duty, 2.8);
        assert_eq!(cfg.servos.tilt.min_duty, 7.0);
        assert_eq!(cfg.servos.pan.max_duty, 11.5);
        assert_eq!(cfg.gains.pan, 0.000_05);
        assert_eq!(cfg.gains.tilt, 0.000_5);
        assert_eq!(cfg.inference.anchors.len(), 5);
        Ok(())
    }

    #[test]
    fn inverted_duty_range_is_a_configuration_error() -> Result<()> {
        let mut cfg = TurretConfig::from_file(TurretConfigFile::default())?;
        cfg.servos.tilt.min_duty = 12.0;
        assert!(cfg.validate().is_err());
        Ok(())
    }

    #[test]
    fn odd_anchor_list_is_rejected() {
        assert!(pair_anchors(vec![1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn anchors_pair_up_in_order() -> Result<()> {
        let anchors = pair_anchors(vec![1.0, 2.0, 3.0, 4.0])?;
        assert_eq!(anchors, vec![(1.0, 2.0), (3.0, 4.0)]);
        Ok(())
    }

    #[test]
    fn thresholds_outside_unit_range_are_rejected() -> Result<()> {
        let mut cfg = TurretConfig::from_file(TurretConfigFile::default())?;
        cfg.inference.confidence_threshold = 1.5;
        assert!(cfg.validate().is_err());
        Ok(())
    }
}
