use facerec_core::detector::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_NMS_THRESHOLD};
use facerec_core::recognizer::{
    scale_range, DEFAULT_SCALE_END, DEFAULT_SCALE_START, DEFAULT_SCALE_STEP, DEFAULT_THRESHOLD,
};
use facerec_core::{DetectorConfig, RecognizerConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration.
///
/// Layered lowest to highest: built-in defaults, optional TOML file,
/// `FACEREC_*` environment variables, command-line flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory of reference face images; file stems become labels.
    pub gallery_dir: PathBuf,
    /// SCRFD ONNX face detection model.
    pub detector_model: PathBuf,
    /// V4L2 device path.
    pub camera_device: String,
    pub capture_width: u32,
    pub capture_height: u32,
    /// Similarity a match must exceed.
    pub threshold: f32,
    /// Probe scale factors tried against every gallery entry.
    pub scales: Vec<f32>,
    /// Minimum detector confidence for a face region.
    pub confidence_threshold: f32,
    /// IoU above which overlapping detections are suppressed.
    pub nms_threshold: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gallery_dir: PathBuf::from("images"),
            detector_model: PathBuf::from("models/det_10g.onnx"),
            camera_device: "/dev/video0".to_string(),
            capture_width: 640,
            capture_height: 480,
            threshold: DEFAULT_THRESHOLD,
            scales: scale_range(DEFAULT_SCALE_START, DEFAULT_SCALE_END, DEFAULT_SCALE_STEP),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
        }
    }
}

impl Config {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Override fields from `FACEREC_*` variables. Unparseable values are
    /// logged and ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FACEREC_GALLERY_DIR") {
            self.gallery_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEREC_DETECTOR_MODEL") {
            self.detector_model = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEREC_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        env_parse(&lookup, "FACEREC_CAPTURE_WIDTH", &mut self.capture_width);
        env_parse(&lookup, "FACEREC_CAPTURE_HEIGHT", &mut self.capture_height);
        env_parse(&lookup, "FACEREC_THRESHOLD", &mut self.threshold);
        env_parse(&lookup, "FACEREC_CONFIDENCE_THRESHOLD", &mut self.confidence_threshold);

        if let Some(v) = lookup("FACEREC_SCALES") {
            match parse_scales(&v) {
                Some(scales) => self.scales = scales,
                None => tracing::warn!(key = "FACEREC_SCALES", value = %v, "ignoring unparseable value"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-1.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::Invalid(format!(
                "threshold {} outside [-1, 1]",
                self.threshold
            )));
        }
        if self.scales.is_empty() {
            return Err(ConfigError::Invalid("at least one scale is required".into()));
        }
        if let Some(bad) = self.scales.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(ConfigError::Invalid(format!("scale {bad} must be positive")));
        }
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(ConfigError::Invalid("capture size must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold {} outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.nms_threshold) {
            return Err(ConfigError::Invalid(format!(
                "nms_threshold {} outside [0, 1]",
                self.nms_threshold
            )));
        }
        Ok(())
    }

    pub fn recognizer(&self) -> RecognizerConfig {
        RecognizerConfig {
            threshold: self.threshold,
            scales: self.scales.clone(),
        }
    }

    pub fn detector(&self) -> DetectorConfig {
        DetectorConfig {
            confidence_threshold: self.confidence_threshold,
            nms_threshold: self.nms_threshold,
        }
    }
}

fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable value"),
    }
}

/// Comma-separated scale list, e.g. `"0.8,0.9,1.0"`.
fn parse_scales(raw: &str) -> Option<Vec<f32>> {
    raw.split(',')
        .map(|s| s.trim().parse::<f32>().ok())
        .collect::<Option<Vec<_>>>()
        .filter(|scales| !scales.is_empty())
}
