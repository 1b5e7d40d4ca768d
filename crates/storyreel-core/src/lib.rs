//! Storyreel Core Library
//!
//! Turns narration audio, a word-timing sequence, a background clip and a
//! caption style into a finished vertical video with burned-in,
//! word-synchronized captions.
//!
//! The library is organised the same way throughout:
//! - `core::captions` synthesizes the subtitle track (pure, deterministic)
//! - `core::render` reconciles durations, picks the background window and
//!   drives composition
//! - `core::jobs` owns per-request temp artifacts
//! - `core::pipeline` wires everything behind narrow capability traits

pub mod core;

use std::path::Path;
use std::sync::OnceLock;

pub use crate::core::pipeline::{
    NarratedRenderRequest, RenderOutcome, RenderPipeline, RenderRequest,
};
pub use crate::core::{CoreError, CoreResult};

// =============================================================================
// Logging
// =============================================================================

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Installs the global tracing subscriber.
///
/// Logs go to stderr and, when `log_dir` is given, to a daily-rolling file.
/// Filtering follows `RUST_LOG` with `info` as the floor. Calling this more
/// than once is harmless; later calls keep the first subscriber.
pub fn init_logging(log_dir: Option<&Path>) {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let file_layer = log_dir.and_then(|dir| {
        // Best effort: a read-only log dir should not keep the CLI from running.
        std::fs::create_dir_all(dir).ok()?;
        let file_appender = tracing_appender::rolling::daily(dir, "storyreel.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    // Avoid panics if already initialized (tests, repeated CLI setup).
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        init_logging(Some(dir.path()));
        init_logging(None);
        tracing::info!("logging initialised twice without panicking");
    }
}
