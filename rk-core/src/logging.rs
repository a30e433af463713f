//! Tracing setup for the Rentkar binaries.
//!
//! Console output goes to stderr; a daily-rotated `rentkar.log` (plain text
//! or JSON) sits under the configured log directory. The WebSocket and HTTP
//! stacks are capped at `warn` unless the configured level names them.

use std::path::Path;

use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{RkError, RkResult};

/// Dependencies that log every frame or connection at debug level.
const QUIET_TARGETS: &[&str] = &["tungstenite", "tokio_tungstenite", "hyper", "reqwest", "rustls"];

const LOG_FILE_PREFIX: &str = "rentkar.log";

/// Expand the configured level into a full filter directive string.
///
/// An unparsable level falls back to `info`. Quiet targets the caller
/// already mentions are left alone.
pub fn filter_directives(level: &str) -> String {
    let level = level.trim();
    let base = if level.is_empty() || EnvFilter::try_new(level).is_err() {
        "info"
    } else {
        level
    };

    let mut directives = vec![base.to_string()];
    for target in QUIET_TARGETS {
        let named = base
            .split(',')
            .any(|d| d.split('=').next().map(str::trim) == Some(*target));
        if !named {
            directives.push(format!("{target}=warn"));
        }
    }
    directives.join(",")
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process; dropping it flushes the file writer.
pub fn init_logging(level: &str, log_dir: &Path, json_output: bool) -> RkResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));
    let directives = filter_directives(level);
    let filter = EnvFilter::try_new(&directives).map_err(|e| RkError::Config(e.to_string()))?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    // Exactly one file layer is Some.
    let (json_layer, text_layer) = if json_output {
        let layer = fmt::layer()
            .with_writer(writer)
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        (Some(layer), None)
    } else {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        (None, Some(layer))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| RkError::Internal(format!("logging already initialized: {e}")))?;

    tracing::info!("logging to {} with filter {directives}", log_dir.display());
    Ok(LogGuard { _guard: guard })
}

/// Keeps the non-blocking file writer alive.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}
