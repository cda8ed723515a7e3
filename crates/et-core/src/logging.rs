//! Logging initialization using the `tracing` ecosystem.
//!
//! All reporting in this system (lifecycle progress, order acknowledgements,
//! dropped requests, protocol anomalies) goes through `tracing`. This module
//! installs the subscriber:
//! - Console output, human-readable or JSON lines
//! - Optional file output with daily rotation via `tracing-appender`
//! - Level from `RUST_LOG` if set, otherwise the explicit parameter

use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Console/file line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Initialize the global tracing subscriber.
///
/// Call once at program start. When `log_dir` is given, the returned guard
/// owns the background writer thread and must be kept alive until exit or
/// buffered lines are lost.
///
/// - `log_level`: default filter if `RUST_LOG` is not set (e.g. `"info"`)
/// - `log_dir`: optional directory for daily-rotating log files
/// - `module_name`: log file prefix (e.g. `"emsx_trigger"`)
pub fn init_logging(
    log_level: &str,
    log_dir: Option<&str>,
    module_name: &str,
    format: LogFormat,
) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let (pretty, json) = match format {
        LogFormat::Pretty => (
            Some(fmt::layer().with_target(true).with_thread_ids(true).with_ansi(true)),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_target(true).with_thread_ids(true)),
        ),
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, module_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty)
        .with(json)
        .with(file_layer)
        .init();

    guard
}
