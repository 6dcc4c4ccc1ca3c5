//! # Text Recognition Module
//!
//! Wraps an opaque text-recognition engine behind the [`TextRecognizer`]
//! trait. Engines report their lifecycle as a stream of [`EngineEvent`]s; the
//! adapter forwards only the actively-recognizing phase to the caller as a
//! normalized fractional progress value, enforces the per-operation timeout,
//! and reduces engine failures to a human-readable message.
//!
//! A Tesseract-backed implementation ([`TesseractRecognizer`]) is provided
//! via `leptess`. Any engine honoring the trait contract can be substituted,
//! which is how the pipeline is tested without a Tesseract installation.

use leptess::LepTess;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, PipelineResult};

/// Lifecycle phase of a recognition engine run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// Engine construction and resource acquisition
    Initializing,
    /// Language model loading
    LoadingLanguage,
    /// Active text recognition; the only phase carrying meaningful progress
    Recognizing,
}

/// One lifecycle/progress event emitted by a recognition engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineEvent {
    pub phase: EnginePhase,
    /// Fractional progress in [0, 1] for the current phase
    pub progress: f32,
}

/// An opaque text-recognition capability.
///
/// Implementations receive enhanced raster bytes and a sink for lifecycle
/// events, and return recognized plain text (possibly empty). Engine-held
/// resources must be scoped to the call; nothing may leak across invocations.
pub trait TextRecognizer: Send + Sync {
    fn recognize_raw(
        &self,
        image: &[u8],
        events: &mut dyn FnMut(EngineEvent),
    ) -> anyhow::Result<String>;
}

/// Tesseract-backed recognition engine with a single fixed language profile.
///
/// A fresh `LepTess` instance is constructed inside every call and dropped on
/// return, so no engine state survives between jobs. Tesseract exposes no
/// incremental recognition callback, so the Recognizing phase is reported
/// coarsely: 0.0 before the engine runs and 1.0 once text is available.
pub struct TesseractRecognizer {
    languages: String,
    tessdata_dir: Option<String>,
}

impl TesseractRecognizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            languages: config.languages.clone(),
            tessdata_dir: config.tessdata_dir.clone(),
        }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize_raw(
        &self,
        image: &[u8],
        events: &mut dyn FnMut(EngineEvent),
    ) -> anyhow::Result<String> {
        events(EngineEvent {
            phase: EnginePhase::Initializing,
            progress: 0.0,
        });

        let mut tess = LepTess::new(self.tessdata_dir.as_deref(), &self.languages)
            .map_err(|e| anyhow::anyhow!("failed to initialize recognition engine: {}", e))?;

        events(EngineEvent {
            phase: EnginePhase::LoadingLanguage,
            progress: 1.0,
        });

        tess.set_image_from_mem(image)
            .map_err(|e| anyhow::anyhow!("failed to load image into recognition engine: {}", e))?;

        events(EngineEvent {
            phase: EnginePhase::Recognizing,
            progress: 0.0,
        });

        let text = tess
            .get_utf8_text()
            .map_err(|e| anyhow::anyhow!("text recognition failed: {}", e))?;

        events(EngineEvent {
            phase: EnginePhase::Recognizing,
            progress: 1.0,
        });

        Ok(text)
        // LepTess dropped here: engine resources are released per call.
    }
}

/// Recognize text from enhanced raster bytes.
///
/// Forwards only Recognizing-phase progress events to `on_progress`, clamped
/// to [0, 1]; other engine lifecycle phases produce no callback. The engine
/// call itself is synchronous and CPU-bound, so it runs on the blocking
/// thread pool while this future watches its event stream under the
/// configured timeout. On timeout the in-flight engine call is abandoned and
/// runs to natural completion off the async runtime. Recognized text is
/// cleaned up (trimmed lines, empty lines dropped) before being returned; an
/// empty result is a valid success.
///
/// # Errors
///
/// Returns [`PipelineError::Recognition`] when the engine fails or the
/// timeout elapses. The message is human-readable; no internal engine
/// diagnostics cross this boundary.
pub async fn recognize_text<F>(
    engine: Arc<dyn TextRecognizer>,
    image: &[u8],
    config: &PipelineConfig,
    mut on_progress: F,
) -> PipelineResult<String>
where
    F: FnMut(f32),
{
    let start_time = std::time::Instant::now();
    let timeout = tokio::time::Duration::from_secs(config.operation_timeout_secs);

    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<EngineEvent>();
    let image = image.to_vec();
    let task = tokio::task::spawn_blocking(move || {
        let mut forward = move |event: EngineEvent| {
            // The receiver may be gone after a timeout; events are then moot.
            let _ = event_tx.send(event);
        };
        engine.recognize_raw(&image, &mut forward)
    });

    let result = tokio::time::timeout(timeout, async {
        while let Some(event) = event_rx.recv().await {
            log_engine_event(&event);
            if event.phase == EnginePhase::Recognizing {
                on_progress(event.progress.clamp(0.0, 1.0));
            }
        }
        // The sender lives inside the blocking closure, so a closed channel
        // means the engine call has returned.
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(anyhow::anyhow!("recognition engine task failed: {}", e)),
        }
    })
    .await;

    let elapsed_ms = start_time.elapsed().as_millis();

    match result {
        Ok(Ok(text)) => {
            let cleaned = text
                .trim()
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<&str>>()
                .join("\n");

            info!(
                "Text recognition completed in {}ms, recognized {} characters",
                elapsed_ms,
                cleaned.len()
            );
            Ok(cleaned)
        }
        Ok(Err(e)) => {
            warn!("Text recognition failed after {}ms: {}", elapsed_ms, e);
            Err(PipelineError::Recognition(e.to_string()))
        }
        Err(_) => {
            warn!(
                "Text recognition timed out after {}ms (limit: {}s)",
                elapsed_ms, config.operation_timeout_secs
            );
            Err(PipelineError::Recognition(format!(
                "recognition timed out after {} seconds",
                config.operation_timeout_secs
            )))
        }
    }
}

/// Debug-log an engine event; useful when tuning a new engine implementation.
fn log_engine_event(event: &EngineEvent) {
    debug!(
        target: "recognition",
        phase = ?event.phase,
        progress = event.progress,
        "Engine event"
    );
}
