//! Logging initialization.
//!
//! The engine emits structured `tracing` events and `metrics` counters
//! everywhere; this module only wires a subscriber for embedders of the
//! crate that do not bring their own. Exporter plumbing belongs to the host
//! application.

use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// JSON lines, one event per line.
    Json,
}

/// Initializes a global `tracing` subscriber.
///
/// The filter comes from `ENGRAM_LOG` (falling back to `RUST_LOG`, then
/// `"info"`). Safe to call more than once: subsequent calls are no-ops.
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_env("ENGRAM_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    // Already initialized by the host; keep theirs.
    drop(result);
}
