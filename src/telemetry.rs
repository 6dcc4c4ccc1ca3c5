//! Tracing setup for the extraction pipeline.
//!
//! Installs a `tracing-subscriber` fmt layer with an environment-driven
//! filter. Collaborating applications that bring their own subscriber can
//! skip `init()` entirely; it is a no-op when a global subscriber is already
//! installed.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging with an `RUST_LOG`-driven filter.
///
/// Defaults to `info` when `RUST_LOG` is unset. Safe to call more than once.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Create a tracing span for a pipeline operation
pub fn pipeline_span(operation: &str) -> tracing::Span {
    tracing::info_span!("pipeline", operation = %operation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }

    #[test]
    fn test_pipeline_span_construction() {
        let span = pipeline_span("enhance");
        let _enter = span.enter();
    }
}
