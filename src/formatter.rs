use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Write;

use crate::encoder::EncoderConfig;
use crate::error::FormatError;
use crate::record::{Frame, LogRecord};

/// Turns a [`LogRecord`] into one line of output.
pub trait RecordFormatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> Result<String, FormatError>;
}

impl<F: RecordFormatter + ?Sized> RecordFormatter for Box<F> {
    fn format(&self, record: &LogRecord) -> Result<String, FormatError> {
        (**self).format(record)
    }
}

/// Default strftime pattern for record timestamps, e.g. `2024-05-01 13:55:36,042`.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Attributes handled by the formatter itself and never copied verbatim.
const SPECIAL_CASES: &[&str] = &["msg", "args", "timestamp", "exc_info"];

/// Builtin attributes copied into every JSON document, in output order.
const DOCUMENT_ATTRIBUTES: &[&str] = &[
    "name",
    "level",
    "levelno",
    "module_path",
    "file",
    "line",
    "thread_name",
    "process",
];

pub(crate) fn format_timestamp(
    timestamp: &DateTime<Utc>,
    pattern: &str,
    use_utc: bool,
) -> Result<String, FormatError> {
    let mut out = String::with_capacity(32);
    let written = if use_utc {
        write!(out, "{}", timestamp.format(pattern))
    } else {
        write!(out, "{}", timestamp.with_timezone(&Local).format(pattern))
    };
    written.map_err(|_| FormatError::TimeFormat(pattern.to_string()))?;
    Ok(out)
}

/// Embedded `traceback` document of a JSON log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TracebackRecord {
    pub message: String,
    pub stack: Vec<StackEntry>,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackEntry {
    pub file: String,
    pub func: String,
    pub line: String,
    pub text: String,
}

impl From<&Frame> for StackEntry {
    fn from(frame: &Frame) -> Self {
        StackEntry {
            file: frame.file.clone(),
            func: frame.func.clone(),
            line: frame.line.to_string(),
            text: frame.text.clone(),
        }
    }
}

/// Format records as compact JSON documents.
///
/// The document contains every attribute of the record except:
///
/// - `msg` and `args`, which are rendered into `message`
/// - `timestamp`, which is rendered with the configured time format
/// - `exc_info`, which becomes an embedded `traceback` document
/// - *dunder* extras such as `__internal__`
///
/// Meant to be combined with a [`crate::filter::ContextFilter`] so that
/// every document carries the same set of properties.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    encoder: EncoderConfig,
    time_format: String,
    use_utc: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            use_utc: false,
        }
    }

    pub fn with_encoder(mut self, encoder: EncoderConfig) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_time_format(mut self, pattern: impl Into<String>) -> Self {
        self.time_format = pattern.into();
        self
    }

    /// Render timestamps in UTC instead of local time.
    pub fn with_utc(mut self, use_utc: bool) -> Self {
        self.use_utc = use_utc;
        self
    }

    pub fn encoder(&self) -> &EncoderConfig {
        &self.encoder
    }

    /// The `timestamp` value this formatter writes for `record`.
    pub fn format_time(&self, record: &LogRecord) -> Result<String, FormatError> {
        format_timestamp(&record.timestamp, &self.time_format, self.use_utc)
    }

    /// Extract the traceback document, if the record carries a usable one.
    pub fn extract_exc_record(record: &LogRecord) -> Option<TracebackRecord> {
        let exc = record.exc_info.as_ref()?;
        let type_name = exc.type_name.clone()?;
        Some(TracebackRecord {
            message: exc.value.clone().unwrap_or_default(),
            stack: exc.frames.iter().map(StackEntry::from).collect(),
            type_name,
        })
    }

    /// Whether an extra named `name` belongs in the document.
    pub fn should_be_logged(name: &str) -> bool {
        !SPECIAL_CASES.contains(&name)
            && name != "traceback"
            && !(name.starts_with("__") && name.ends_with("__"))
    }

    /// The document that [`RecordFormatter::format`] encodes.
    pub fn document(&self, record: &LogRecord) -> Result<Map<String, Value>, FormatError> {
        let mut doc = Map::new();
        doc.insert("message".to_string(), Value::String(record.get_message()?));
        doc.insert("timestamp".to_string(), Value::String(self.format_time(record)?));

        for &name in DOCUMENT_ATTRIBUTES {
            if let Some(value) = record.attribute(name) {
                doc.insert(name.to_string(), value);
            }
        }

        for (name, value) in &record.extra {
            if Self::should_be_logged(name) && !doc.contains_key(name) {
                doc.insert(name.clone(), value.clone());
            }
        }

        if let Some(tb) = Self::extract_exc_record(record) {
            doc.insert("traceback".to_string(), serde_json::to_value(tb)?);
        }
        Ok(doc)
    }
}

impl RecordFormatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> Result<String, FormatError> {
        let doc = self.document(record)?;
        self.encoder.encode(&doc)
    }
}

/// Format lines as JSON documents.
///
/// Kept for compatibility with configurations that still name it; it
/// behaves exactly like [`JsonFormatter`].
#[deprecated(since = "0.2.0", note = "use `JsonFormatter` instead")]
#[derive(Debug, Clone)]
pub struct JsonRequestFormatter {
    inner: JsonFormatter,
}

#[allow(deprecated)]
impl Default for JsonRequestFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(deprecated)]
impl JsonRequestFormatter {
    pub fn new() -> Self {
        Self::from_formatter(JsonFormatter::new())
    }

    pub fn from_formatter(inner: JsonFormatter) -> Self {
        tracing::warn!(
            "JsonRequestFormatter is deprecated and will be removed in a future version, use JsonFormatter"
        );
        Self { inner }
    }
}

#[allow(deprecated)]
impl RecordFormatter for JsonRequestFormatter {
    fn format(&self, record: &LogRecord) -> Result<String, FormatError> {
        self.inner.format(record)
    }
}
