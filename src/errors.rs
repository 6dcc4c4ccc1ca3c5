//! # Pipeline Error Types
//!
//! This module defines the error taxonomy used throughout the extraction
//! pipeline. Every error is job-scoped: the orchestrator catches it at the
//! job boundary, records it as the job's failure reason and moves on to the
//! next queued image.

use std::fmt;

/// Errors produced by the image-to-number extraction pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Input bytes could not be decoded as a raster image
    Decode(String),
    /// A required processing or encoding surface was unavailable
    Environment(String),
    /// The recognition engine failed or produced no usable result
    Recognition(String),
    /// Configuration validation errors
    Config(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Decode(msg) => write!(f, "[DECODE] {}", msg),
            PipelineError::Environment(msg) => write!(f, "[ENVIRONMENT] {}", msg),
            PipelineError::Recognition(msg) => write!(f, "[RECOGNITION] {}", msg),
            PipelineError::Config(msg) => write!(f, "[CONFIG] {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        // Engine-seam errors surface as recognition failures; only the
        // human-readable message crosses the boundary.
        PipelineError::Recognition(err.to_string())
    }
}

/// Result type alias for convenience
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Standardized error logging utilities for consistent failure reporting
pub mod error_logging {
    use tracing::error;

    /// Log a pipeline stage failure with job context
    pub fn log_stage_error(
        error: &impl std::fmt::Display,
        stage: &str,
        source_name: &str,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            stage = %stage,
            source = %source_name,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "Pipeline stage failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            "Configuration error"
        );
    }
}
