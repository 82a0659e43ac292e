//! Tracing setup: console output plus the append-only error log.
//!
//! The console layer honours `RUST_LOG` (default `channel_scraper=info`).
//! The file layer only takes `ERROR` events and writes them to
//! `logs/scraper.log` as `<timestamp> - <LEVEL> - <message>`.

use std::fmt;
use std::io;

use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{Error, Result};
use crate::layout::{OutputLayout, LOG_FILE_NAME};

/// Keeps the non-blocking file writer alive; dropping it flushes the log.
pub struct LogGuard {
    _file: WorkerGuard,
}

/// One line per event: `2024-03-09 10:15:02,123 - ERROR - chemed: ...`
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainLineFormat;

impl<S, N> FormatEvent<S, N> for PlainLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        write!(writer, "{} - {} - ", timestamp, event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// File layer accepting only errors, rendered with [`PlainLineFormat`].
pub fn error_file_layer<S, W>(make_writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_writer(make_writer)
        .with_ansi(false)
        .event_format(PlainLineFormat)
        .with_filter(LevelFilter::ERROR)
}

/// Install the global subscriber. The log directory must already exist.
pub fn init(layout: &OutputLayout) -> Result<LogGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("channel_scraper=info"))
        .map_err(|e| Error::LoggingError(e.to_string()))?;

    let file_appender = tracing_appender::rolling::never(layout.logs_dir(), LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(error_file_layer(file_writer))
        .try_init()
        .map_err(|e| Error::LoggingError(e.to_string()))?;

    tracing::debug!(log = %layout.log_file().display(), "tracing initialized");
    Ok(LogGuard { _file: guard })
}
