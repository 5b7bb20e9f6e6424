use crate::filter::ContextFilter;
use crate::formatter::RecordFormatter;
use crate::record::{ExcInfo, Frame, Level, LogRecord};
use crate::sink::{EXTRA_FIELD, LOGGER_FIELD};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns every event into a [`LogRecord`],
/// runs it through the configured [`ContextFilter`]s and writes the
/// formatted line to a writer.
///
/// Formatting and write failures are reported on stderr and counted; the
/// event is dropped and the application keeps running.
pub struct FormatLayer<F, W = fn() -> io::Stdout> {
    formatter: F,
    filters: Vec<ContextFilter>,
    make_writer: W,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Events dropped because formatting or writing failed.
    pub failed_events: Arc<AtomicU64>,
}

impl<F: RecordFormatter> FormatLayer<F> {
    /// Layer writing to stdout.
    pub fn new(formatter: F) -> Self {
        Self {
            formatter,
            filters: Vec::new(),
            make_writer: io::stdout as fn() -> io::Stdout,
            total_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<F, W> FormatLayer<F, W> {
    pub fn with_writer<W2>(self, make_writer: W2) -> FormatLayer<F, W2>
    where
        W2: for<'w> MakeWriter<'w>,
    {
        FormatLayer {
            formatter: self.formatter,
            filters: self.filters,
            make_writer,
            total_events: self.total_events,
            failed_events: self.failed_events,
        }
    }

    /// Add a filter; filters run in the order they were added.
    pub fn with_filter(mut self, filter: ContextFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn formatter(&self) -> &F {
        &self.formatter
    }
}

/// Build a [`LogRecord`] from a `tracing` event.
///
/// The target becomes the logger name unless the event carries a `logger`
/// field. An error recorded through `record_error` becomes the record's
/// exception info, with the event's location as its only frame.
pub fn record_from_event(event: &Event<'_>) -> LogRecord {
    let meta = event.metadata();
    let mut visitor = FieldVisitor::default();
    event.record(&mut visitor);

    let name = visitor.logger.unwrap_or_else(|| meta.target().to_string());
    let mut record = LogRecord::new(name, Level::from(meta.level()), visitor.message.unwrap_or_default())
        .with_location(meta.module_path(), meta.file(), meta.line());
    record.extra = visitor.fields;

    if let Some(exc) = visitor.exc_info {
        let frame = Frame::new(
            meta.file().unwrap_or("<unknown>"),
            meta.module_path().unwrap_or_default(),
            meta.line().unwrap_or_default(),
            "",
        );
        record.exc_info = Some(exc.with_frame(frame));
    }
    record
}

impl<S, F, W> Layer<S> for FormatLayer<F, W>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    F: RecordFormatter + 'static,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let mut record = record_from_event(event);
        for filter in &self.filters {
            if !filter.filter(&mut record) {
                return;
            }
        }

        let line = match self.formatter.format(&record) {
            Ok(line) => line,
            Err(e) => {
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("failed to format log record: {}", e);
                return;
            }
        };

        let mut writer = self.make_writer.make_writer();
        if let Err(e) = writeln!(writer, "{}", line) {
            self.failed_events.fetch_add(1, Ordering::Relaxed);
            eprintln!("failed to write log record: {}", e);
        }
    }
}

/// Leading identifier of an error's `Debug` output, e.g. `ParseIntError`.
fn error_type_name(err: &(dyn std::error::Error + 'static)) -> String {
    let debug = format!("{:?}", err);
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        "Error".to_string()
    } else {
        name
    }
}

#[derive(Default)]
pub struct FieldVisitor {
    pub fields: BTreeMap<String, Value>,
    pub message: Option<String>,
    pub logger: Option<String>,
    pub exc_info: Option<ExcInfo>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            LOGGER_FIELD => self.logger = Some(value.to_string()),
            EXTRA_FIELD => match serde_json::from_str::<Value>(value) {
                Ok(Value::Object(extra)) => self.fields.extend(extra),
                _ => self.insert(field, Value::String(value.to_string())),
            },
            _ => self.insert(field, Value::String(value.to_string())),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, _field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.exc_info = Some(ExcInfo::new(error_type_name(value), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, Value::String(format!("{:?}", value)));
        }
    }
}
