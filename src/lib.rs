//! # phonescan
//!
//! Extracts Indian mobile numbers from photographed or scanned documents,
//! entirely in-process. Each submitted image is enhanced for legibility,
//! passed through a text-recognition engine and scanned for 10-digit mobile
//! number patterns, which are normalized to canonical `91` + 10-digit form
//! and deduplicated per job.

pub mod config;
pub mod enhancement;
pub mod errors;
pub mod extraction;
pub mod orchestrator;
pub mod recognition;
pub mod telemetry;

// Re-export types for easier access
pub use config::{load_config, PipelineConfig};
pub use errors::{PipelineError, PipelineResult};
pub use extraction::NumberExtractor;
pub use orchestrator::{ImageFile, JobId, JobSnapshot, JobState, Orchestrator};
pub use recognition::{EngineEvent, EnginePhase, TesseractRecognizer, TextRecognizer};
