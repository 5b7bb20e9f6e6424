use crate::access::ACCESS_LOGGER;
use crate::record::{Level, LogRecord};
use std::sync::Arc;

/// Field carrying the originating logger name on events emitted by [`TracingSink`].
pub const LOGGER_FIELD: &str = "logger";

/// Field carrying the record's extras, JSON-encoded, on events emitted by
/// [`TracingSink`]. [`crate::layer::FormatLayer`] expands it back into extras.
pub const EXTRA_FIELD: &str = "extra";

/// Destination for [`LogRecord`]s produced by the access loggers.
///
/// Implementations decide where a record goes (the `tracing` dispatcher,
/// an in-memory buffer, a test probe). `emit` is called synchronously on
/// the request path once per completed request, so it should not block.
pub trait RecordSink: Send + Sync {
    /// Hand a single, fully-populated record to the destination.
    fn emit(&self, record: LogRecord);
}

impl<S: RecordSink + ?Sized> RecordSink for Arc<S> {
    fn emit(&self, record: LogRecord) {
        (**self).emit(record)
    }
}

impl<S: RecordSink + ?Sized> RecordSink for &S {
    fn emit(&self, record: LogRecord) {
        (**self).emit(record)
    }
}

/// Forwards records into `tracing` under the `access` target at the
/// record's level.
///
/// The interpolated message becomes the event message; the logger name and
/// the JSON-encoded extras travel as the `logger` and `extra` fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl RecordSink for TracingSink {
    fn emit(&self, record: LogRecord) {
        let message = match record.get_message() {
            Ok(message) => message,
            Err(e) => {
                eprintln!("failed to interpolate access log message: {}", e);
                record.msg.clone()
            }
        };
        let extra = if record.extra.is_empty() {
            None
        } else {
            serde_json::to_string(&record.extra).ok()
        };
        let logger = record.name.as_str();
        let extra = extra.as_deref();

        match record.level {
            Level::Debug => {
                tracing::event!(target: ACCESS_LOGGER, tracing::Level::DEBUG, logger, extra, "{}", message)
            }
            Level::Info => {
                tracing::event!(target: ACCESS_LOGGER, tracing::Level::INFO, logger, extra, "{}", message)
            }
            Level::Warning => {
                tracing::event!(target: ACCESS_LOGGER, tracing::Level::WARN, logger, extra, "{}", message)
            }
            Level::Error | Level::Critical => {
                tracing::event!(target: ACCESS_LOGGER, tracing::Level::ERROR, logger, extra, "{}", message)
            }
        }
    }
}
