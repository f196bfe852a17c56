// Configuration for the annotation engine

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Segmentation model parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Edge length of the model's square input frame
    pub model_edge: f64,
    /// Encoder input resolution (square)
    pub encoder_input_size: u32,
    /// Mask values above this are foreground when binarizing for transport
    pub mask_threshold: f32,
    /// Mask values above this turn a new click into a negative point
    pub foreground_threshold: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_edge: 1024.0,
            encoder_input_size: 1024,
            mask_threshold: 0.5,
            foreground_threshold: 0.5,
        }
    }
}

/// Review playback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub interval_ms: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self { interval_ms: 500 }
    }
}

impl ReviewConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Tracking backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/process".to_string(),
            timeout_secs: 120,
        }
    }
}

impl TrackingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where frame images are served from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FramesConfig {
    pub base_url: String,
    pub raw_prefix: String,
    pub compressed_prefix: String,
}

impl Default for FramesConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            raw_prefix: "video_images_raw".to_string(),
            compressed_prefix: "video_images_compressed".to_string(),
        }
    }
}

/// Object type catalog seed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub default_types: Vec<String>,
    /// Display colors, handed out round-robin as types are registered
    pub palette: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_types: [
                "Door",
                "Elevator",
                "Stairs",
                "Ramp",
                "Entrance",
                "Front Desk",
                "Restroom",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            palette: [
                "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0",
                "#f032e6", "#bcf60c", "#fabebe",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Complete annotator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    pub models: ModelConfig,
    pub review: ReviewConfig,
    pub tracking: TrackingConfig,
    pub frames: FramesConfig,
    pub catalog: CatalogConfig,
    pub log_level: String,
}

impl AnnotatorConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::Configuration(format!(
                "Path traversal detected: '{}'",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from string. JSON, TOML and YAML are tried in that order.
    pub fn from_str(content: &str) -> Result<Self> {
        if let Ok(config) = serde_json::from_str::<AnnotatorConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = toml::from_str::<AnnotatorConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = serde_yaml::from_str::<AnnotatorConfig>(content) {
            return Ok(config);
        }

        Err(Error::Deserialization("Unknown configuration format".to_string()))
    }

    /// Defaults overlaid with environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `VIDMARK_*` environment variables onto this configuration
    pub fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var("VIDMARK_TRACKING_ENDPOINT") {
            self.tracking.endpoint = endpoint;
        }

        if let Ok(base_url) = std::env::var("VIDMARK_FRAMES_BASE_URL") {
            self.frames.base_url = base_url;
        }

        if let Ok(interval) = std::env::var("VIDMARK_REVIEW_INTERVAL_MS") {
            if let Ok(ms) = interval.parse::<u64>() {
                self.review.interval_ms = ms;
            }
        }

        if let Ok(level) = std::env::var("VIDMARK_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Effective log level, falling back to `info`
    pub fn log_level(&self) -> &str {
        if self.log_level.trim().is_empty() {
            "info"
        } else {
            &self.log_level
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.models.mask_threshold) {
            return Err(Error::Validation(
                "models.mask_threshold must be within [0, 1]".to_string(),
            ));
        }

        if !unit.contains(&self.models.foreground_threshold) {
            return Err(Error::Validation(
                "models.foreground_threshold must be within [0, 1]".to_string(),
            ));
        }

        if !(self.models.model_edge.is_finite() && self.models.model_edge > 0.0) {
            return Err(Error::Validation(
                "models.model_edge must be a positive number".to_string(),
            ));
        }

        if self.models.encoder_input_size == 0 || self.models.encoder_input_size > 4096 {
            return Err(Error::Validation(
                "models.encoder_input_size must be between 1 and 4096".to_string(),
            ));
        }

        if self.review.interval_ms == 0 {
            return Err(Error::Validation(
                "review.interval_ms cannot be 0".to_string(),
            ));
        }

        if self.tracking.endpoint.trim().is_empty() {
            return Err(Error::Validation(
                "tracking.endpoint cannot be empty".to_string(),
            ));
        }

        if self.tracking.timeout_secs == 0 {
            return Err(Error::Validation(
                "tracking.timeout_secs cannot be 0".to_string(),
            ));
        }

        if self.catalog.palette.is_empty() {
            return Err(Error::Validation(
                "catalog.palette needs at least one color".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}
