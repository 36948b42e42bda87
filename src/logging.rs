//! Logging initialization
//!
//! Logs go to stderr so that stdout carries only the mining result. With a
//! log file configured, events are written through a background appender
//! whose guard must be kept alive until the program exits.

use crate::config::{LogFormat, LogLevel};
use crate::{Error, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber
///
/// `RUST_LOG` overrides `level` when set. Returns the appender guard when
/// logging to a file.
pub fn init(level: LogLevel, format: LogFormat, file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let (writer, guard, ansi) = match file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            (writer, Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), None, true),
    };

    let result = match format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(false)
                .with_thread_names(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
        }
        LogFormat::Plain => {
            let fmt_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(false);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
        }
    };

    result.map_err(|e| Error::config(format!("Failed to initialize logging: {}", e)))?;
    Ok(guard)
}

fn file_writer(path: &Path) -> Result<(BoxMakeWriter, WorkerGuard)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::config(format!("Invalid log file path: {}", path.display())))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    Ok((BoxMakeWriter::new(non_blocking), guard))
}
