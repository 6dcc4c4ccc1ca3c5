//! # Pipeline Configuration Module
//!
//! Configuration for the extraction pipeline: batch limits, recognition
//! language profile and per-operation timeout. Values can be overridden from
//! a JSON file pointed at by the `PHONESCAN_CONFIG_PATH` environment variable.

use serde::{Deserialize, Serialize};
use std::fs;
use tracing::{info, warn};

use crate::errors::{PipelineError, PipelineResult};

// Constants for pipeline configuration
pub const DEFAULT_LANGUAGES: &str = "eng";
pub const DEFAULT_MAX_IMAGES: usize = 10;
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024; // 10MB limit for input images

/// Configuration structure for the extraction pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of images accepted per batch; excess files are ignored
    pub max_images: usize,
    /// Recognition language codes (e.g., "eng", "eng+hin")
    pub languages: String,
    /// Optional tessdata directory override for the recognition engine
    pub tessdata_dir: Option<String>,
    /// Timeout for one recognition operation in seconds
    pub operation_timeout_secs: u64,
    /// Maximum allowed input image size in bytes
    pub max_image_bytes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_images: DEFAULT_MAX_IMAGES,
            languages: DEFAULT_LANGUAGES.to_string(),
            tessdata_dir: None,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            max_image_bytes: MAX_IMAGE_BYTES,
        }
    }
}

impl PipelineConfig {
    /// Validate pipeline configuration parameters
    pub fn validate(&self) -> PipelineResult<()> {
        if self.max_images == 0 {
            return Err(PipelineError::Config(
                "max_images must be greater than 0".to_string(),
            ));
        }
        if self.languages.trim().is_empty() {
            return Err(PipelineError::Config(
                "languages cannot be empty".to_string(),
            ));
        }
        if self.operation_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "operation_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.max_image_bytes == 0 {
            return Err(PipelineError::Config(
                "max_image_bytes must be greater than 0".to_string(),
            ));
        }
        if let Some(dir) = &self.tessdata_dir {
            if dir.trim().is_empty() {
                return Err(PipelineError::Config(
                    "tessdata_dir cannot be empty if provided".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Load pipeline configuration, honoring the `PHONESCAN_CONFIG_PATH`
/// environment variable when set.
///
/// Falls back to `PipelineConfig::default()` with a warning when the file is
/// missing, unreadable, malformed or fails validation.
pub fn load_config() -> PipelineConfig {
    if let Ok(config_path) = std::env::var("PHONESCAN_CONFIG_PATH") {
        match fs::read_to_string(&config_path) {
            Ok(content) => match serde_json::from_str::<PipelineConfig>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        info!(
                            "Successfully loaded pipeline config from: {}",
                            config_path
                        );
                        return config;
                    }
                    Err(e) => {
                        warn!(
                            "Pipeline config at '{}' failed validation: {}. Falling back to defaults.",
                            config_path, e
                        );
                    }
                },
                Err(e) => {
                    warn!(
                        "Failed to parse pipeline config from '{}': {}. Falling back to defaults.",
                        config_path, e
                    );
                }
            },
            Err(e) => {
                warn!(
                    "Failed to read pipeline config from '{}': {}. Falling back to defaults.",
                    config_path, e
                );
            }
        }
    }

    PipelineConfig::default()
}
