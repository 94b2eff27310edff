//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the configured level. With file logging
//! enabled, a daily rolling file is written under `<data_dir>/logs` through a
//! non-blocking writer; keep the returned guard alive until exit or buffered
//! lines are lost.

use crate::config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file name prefix inside the logs directory
pub const LOG_FILE_PREFIX: &str = "agrolink.log";

/// Build the level filter from `RUST_LOG` or the configured directives
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&config.level).unwrap_or_else(|e| {
            eprintln!("Invalid log level '{}': {}", config.level, e);
            EnvFilter::new("info")
        })
    })
}

/// Install the global subscriber
///
/// Returns the file writer guard when file logging is enabled and the log
/// directory is usable; otherwise logging goes to stderr only. Calling this
/// twice is harmless; the second call leaves the first subscriber in place.
pub fn init(config: &LoggingConfig, data_dir: &Path) -> Option<WorkerGuard> {
    let appender = if config.file {
        let log_dir = data_dir.join("logs");
        match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .build(&log_dir)
        {
            Ok(appender) => Some(appender),
            Err(e) => {
                eprintln!(
                    "File logging disabled, cannot open {}: {}",
                    log_dir.display(),
                    e
                );
                None
            }
        }
    } else {
        None
    };

    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let result = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();

    if let Err(e) = result {
        eprintln!("Logging already initialised: {}", e);
    }
    guard
}
