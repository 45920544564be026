//! Logging infrastructure for quotaline.
//!
//! Logs go to `<quotaline home>/logs/quotaline.log` (rotated daily). Warnings
//! and errors are also written to stderr; stdout is reserved for the status
//! line itself.
//!
//! Log level is controlled by `QUOTALINE_LOG` env var (default: `info`).
//! Examples: `QUOTALINE_LOG=debug`, `QUOTALINE_LOG=quotaline::cache=debug`.

use crate::config::quotaline_home;
use tracing_appender::rolling;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Initialise the global logger. Safe to call multiple times (subsequent
/// calls are no-ops because `try_init` only takes effect once).
pub fn init() {
    let filter = EnvFilter::try_from_env("QUOTALINE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    // The file layer is skipped when the log directory is unusable; stderr still works.
    let file_layer = quotaline_home()
        .ok()
        .map(|home| home.join("logs"))
        .filter(|log_dir| std::fs::create_dir_all(log_dir).is_ok())
        .map(|log_dir| {
            fmt::layer()
                .with_writer(rolling::daily(log_dir, "quotaline.log"))
                .with_target(true)
                .with_ansi(false)
        });

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .without_time()
        .with_filter(LevelFilter::WARN);

    // This silently no-ops if a subscriber is already set (e.g. in tests)
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
}
