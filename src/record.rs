use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::conversion::ConversionSpec;
use crate::error::FormatError;

/// Severity of a [`LogRecord`], ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    /// Numeric severity, from 10 for `DEBUG` up to 50 for `CRITICAL`.
    pub fn value(&self) -> u8 {
        match self {
            Level::Debug => 10,
            Level::Info => 20,
            Level::Warning => 30,
            Level::Error => 40,
            Level::Critical => 50,
        }
    }

    /// Closest `tracing` level. `tracing` has nothing above `ERROR`, so
    /// `Critical` collapses into it.
    pub fn to_tracing(self) -> tracing::Level {
        match self {
            Level::Debug => tracing::Level::DEBUG,
            Level::Info => tracing::Level::INFO,
            Level::Warning => tracing::Level::WARN,
            Level::Error | Level::Critical => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        Level::from(&level)
    }
}

/// One entry of a captured call stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub file: String,
    pub func: String,
    pub line: u32,
    /// Source text of the line, empty when unknown.
    pub text: String,
}

impl Frame {
    pub fn new(
        file: impl Into<String>,
        func: impl Into<String>,
        line: u32,
        text: impl Into<String>,
    ) -> Self {
        Frame {
            file: file.into(),
            func: func.into(),
            line,
            text: text.into(),
        }
    }

    /// Frame describing the location this function was called from.
    #[track_caller]
    pub fn caller(func: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Frame::new(location.file(), func, location.line(), "")
    }
}

/// Exception information attached to a record.
///
/// `type_name` is `None` when a record asked for exception details while
/// no error was at hand; such a record carries no usable traceback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcInfo {
    pub type_name: Option<String>,
    pub value: Option<String>,
    /// Call stack, outermost frame first.
    pub frames: Vec<Frame>,
}

impl ExcInfo {
    pub fn new(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        ExcInfo {
            type_name: Some(type_name.into()),
            value: Some(value.into()),
            frames: Vec::new(),
        }
    }

    /// Exception info requested without an active error.
    pub fn absent() -> Self {
        ExcInfo::default()
    }

    /// Capture the short type name and display message of `err`.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        ExcInfo::new(short_type_name::<E>(), err.to_string())
    }

    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }
}

/// `core::num::error::ParseIntError` -> `ParseIntError`,
/// `dyn core::error::Error` -> `Error`.
fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let full = full.strip_prefix("dyn ").unwrap_or(full);
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).trim().to_string()
}

/// Attributes every [`LogRecord`] carries regardless of its extras.
pub const BUILTIN_ATTRIBUTES: &[&str] = &[
    "name",
    "level",
    "levelno",
    "msg",
    "args",
    "timestamp",
    "module_path",
    "file",
    "line",
    "thread_name",
    "process",
    "exc_info",
];

/// A single logging event as seen by filters and formatters.
///
/// Extra attributes live in a closed `extra` mapping of serializable
/// values; presence is decided by key membership.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Logger name, usually the `tracing` target.
    pub name: String,
    pub level: Level,
    /// Message template, interpolated with `args` by [`LogRecord::get_message`].
    pub msg: String,
    pub args: Vec<Value>,
    pub timestamp: DateTime<Utc>,
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub thread_name: Option<String>,
    pub process: u32,
    pub exc_info: Option<ExcInfo>,
    pub extra: BTreeMap<String, Value>,
}

impl LogRecord {
    pub fn new(name: impl Into<String>, level: Level, msg: impl Into<String>) -> Self {
        LogRecord {
            name: name.into(),
            level,
            msg: msg.into(),
            args: Vec::new(),
            timestamp: Utc::now(),
            module_path: None,
            file: None,
            line: None,
            thread_name: std::thread::current().name().map(|s| s.to_string()),
            process: std::process::id(),
            exc_info: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_extra(key, value);
        self
    }

    pub fn with_exc_info(mut self, exc_info: ExcInfo) -> Self {
        self.exc_info = Some(exc_info);
        self
    }

    pub fn with_location(
        mut self,
        module_path: Option<&str>,
        file: Option<&str>,
        line: Option<u32>,
    ) -> Self {
        self.module_path = module_path.map(|s| s.to_string());
        self.file = file.map(|s| s.to_string());
        self.line = line;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extra.insert(key.into(), value.into());
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Whether `name` is a builtin attribute or a present extra.
    pub fn has_attribute(&self, name: &str) -> bool {
        BUILTIN_ATTRIBUTES.contains(&name) || self.extra.contains_key(name)
    }

    /// Value of a builtin attribute or extra, `None` if absent.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        let value = match name {
            "name" => Value::from(self.name.clone()),
            "level" => Value::from(self.level.as_str()),
            "levelno" => Value::from(self.level.value()),
            "msg" => Value::from(self.msg.clone()),
            "args" => Value::Array(self.args.clone()),
            "timestamp" => Value::from(
                self.timestamp
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            "module_path" => optional(self.module_path.clone()),
            "file" => optional(self.file.clone()),
            "line" => optional(self.line),
            "thread_name" => optional(self.thread_name.clone()),
            "process" => Value::from(self.process),
            "exc_info" => optional(self.exc_info.as_ref().and_then(|e| e.value.clone())),
            _ => return self.extra.get(name).cloned(),
        };
        Some(value)
    }

    /// The message template with its arguments substituted.
    ///
    /// A record without arguments returns its template verbatim, so a
    /// literal `%` in an argument-less message is never an error.
    pub fn get_message(&self) -> Result<String, FormatError> {
        if self.args.is_empty() {
            return Ok(self.msg.clone());
        }
        interpolate(&self.msg, &self.args)
    }
}

fn optional<T: Into<Value>>(value: Option<T>) -> Value {
    value.map(Into::into).unwrap_or(Value::Null)
}

/// `%`-style positional substitution: `%[flags][width][.precision]type`
/// with the usual `s r d i u f e g x o c` conversions, and `%%`.
pub(crate) fn interpolate(template: &str, args: &[Value]) -> Result<String, FormatError> {
    let mut out = String::with_capacity(template.len() + args.len() * 8);
    let mut remaining = args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        let spec = ConversionSpec::parse(&mut chars)?;
        let arg = remaining
            .next()
            .ok_or_else(|| mismatch(template, args))?;
        out.push_str(&spec.render(arg));
    }

    if remaining.next().is_some() {
        return Err(mismatch(template, args));
    }
    Ok(out)
}

fn mismatch(template: &str, args: &[Value]) -> FormatError {
    let expected = template
        .split("%%")
        .map(|chunk| chunk.matches('%').count())
        .sum();
    FormatError::Interpolation {
        template: template.to_string(),
        expected,
        given: args.len(),
    }
}

/// Plain-text rendering of a value: strings unquoted, everything else as JSON.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warning);
        assert!(Level::Warning < Level::Error);
        assert!(Level::Error < Level::Critical);
        assert_eq!(Level::Warning.value(), 30);
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warning);
        assert_eq!(Level::Critical.to_tracing(), tracing::Level::ERROR);
    }

    #[test]
    fn message_without_args_is_verbatim() {
        let record = LogRecord::new("test", Level::Info, "100% done");
        assert_eq!(record.get_message().unwrap(), "100% done");
    }

    #[test]
    fn message_interpolates_positional_args() {
        let record = LogRecord::new("test", Level::Info, "%s got %d items (%r) 50%%")
            .with_args([json!("alice"), json!(3), json!("x")]);
        assert_eq!(record.get_message().unwrap(), "alice got 3 items (\"x\") 50%");
    }

    #[test]
    fn message_honours_width_precision_and_bases() {
        let message = |template: &str, arg: Value| {
            LogRecord::new("test", Level::Info, template)
                .with_args([arg])
                .get_message()
                .unwrap()
        };
        assert_eq!(message("took %.2f ms", json!(3.14159)), "took 3.14 ms");
        assert_eq!(message("[%5s]", json!("ab")), "[   ab]");
        assert_eq!(message("%-5s|", json!("ab")), "ab   |");
        assert_eq!(message("hex %x", json!(255)), "hex ff");
        assert_eq!(message("%05.1f%%", json!(9.87)), "009.9%");
        assert_eq!(message("%e", json!(0.5)), "5.000000e-01");
    }

    #[test]
    fn unknown_conversion_is_rejected() {
        let record = LogRecord::new("test", Level::Info, "%q").with_args([json!(1)]);
        assert!(matches!(
            record.get_message(),
            Err(FormatError::UnsupportedPlaceholder('q'))
        ));
    }

    #[test]
    fn argument_count_mismatch_is_reported() {
        let record = LogRecord::new("test", Level::Info, "%s and %s").with_args([json!(1)]);
        match record.get_message() {
            Err(FormatError::Interpolation { expected, given, .. }) => {
                assert_eq!(expected, 2);
                assert_eq!(given, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let record = LogRecord::new("test", Level::Info, "%s").with_args([json!(1), json!(2)]);
        assert!(matches!(
            record.get_message(),
            Err(FormatError::Interpolation { .. })
        ));
    }

    #[test]
    fn attributes_cover_builtins_and_extras() {
        let record = LogRecord::new("svc", Level::Error, "boom").with_extra("user_id", 42);
        assert!(record.has_attribute("name"));
        assert!(record.has_attribute("user_id"));
        assert!(!record.has_attribute("correlation_id"));
        assert_eq!(record.attribute("levelno"), Some(json!(40)));
        assert_eq!(record.attribute("file"), Some(Value::Null));
        assert_eq!(record.attribute("user_id"), Some(json!(42)));
        assert_eq!(record.attribute("missing"), None);
    }

    #[test]
    fn exc_info_from_error_uses_short_type_name() {
        let err = "x".parse::<i32>().unwrap_err();
        let exc = ExcInfo::from_error(&err);
        assert_eq!(exc.type_name.as_deref(), Some("ParseIntError"));
        assert_eq!(exc.value.as_deref(), Some(err.to_string().as_str()));

        let frame = Frame::caller("caller_test");
        assert!(frame.file.ends_with("record.rs"));
        assert!(frame.line > 0);
    }
}
