//! Structured logging with tracing
//!
//! Sets up:
//! - Console logging on stderr (text or JSON)
//! - File logging with daily rotation (JSON, optional)
//! - Log level from RUST_LOG, falling back to the configured level

use super::config::{LogFormat, MonitoringConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling::daily};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Returns the file writer guard when file logging is on. Dropping the guard
/// stops file logging, so the caller keeps it for the lifetime of the process.
/// Calling this twice is harmless: the second registration is ignored.
pub fn init_tracing(config: &MonitoringConfig) -> std::io::Result<Option<WorkerGuard>> {
    if !config.enabled {
        return Ok(None);
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let console_text = (config.enable_console_logging && config.log_format == LogFormat::Text)
        .then(|| {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
        });
    let console_json = (config.enable_console_logging && config.log_format == LogFormat::Json)
        .then(|| fmt::layer().json().with_writer(std::io::stderr));

    let mut guard = None;
    let file_layer = if config.enable_file_logging {
        config.ensure_log_dir()?;
        let file_appender = daily(&config.log_dir, "menusync.log");
        let (non_blocking_file, file_guard) = non_blocking(file_appender);
        guard = Some(file_guard);
        Some(
            fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .json(),
        )
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_text)
        .with(console_json)
        .with(file_layer)
        .try_init();

    Ok(guard)
}
