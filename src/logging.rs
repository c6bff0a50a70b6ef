//! Process-wide tracing setup.
//!
//! Grounded on the teacher's `plugins::logging` module: a rolling daily log
//! file under the platform-local log directory, `RUST_LOG`-controlled
//! verbosity (defaulting to `info`), and `tracing_log::LogTracer` so any
//! dependency still emitting through the `log` facade is folded into the
//! same pipeline. Callers that don't want file logging (library embedding,
//! tests) can skip `init` entirely — nothing else in this crate assumes a
//! subscriber is installed.

use std::path::PathBuf;
use std::sync::OnceLock;

static GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initializes the global tracing subscriber with a non-blocking, rolling
/// daily log file. Safe to call more than once; only the first call takes
/// effect.
pub fn init() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let log_dir = resolve_log_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "turn-core.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = GUARD.set(guard);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()
        .ok();

    tracing_log::LogTracer::init().ok();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "turn-core started");
}

fn resolve_log_dir() -> PathBuf {
    dirs::data_local_dir().map(|d| d.join("turn-core")).unwrap_or_else(std::env::temp_dir)
}
