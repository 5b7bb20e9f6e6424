//! Access-log records for completed HTTP requests.
//!
//! Each logging function takes a [`RequestDescriptor`] and emits exactly one
//! record to the `access` logger. The level follows the response status:
//! below 400 is `INFO`, 400-499 is `WARNING`, 500 and above is `ERROR`.

use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, Version};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::env::ENVIRONMENT_ENV;
use crate::error::ConfigError;
use crate::record::{Level, LogRecord};
use crate::recording::AccessLogRecorder;
use crate::sink::{RecordSink, TracingSink};

/// Logger name of every access record.
pub const ACCESS_LOGGER: &str = "access";

/// Request header consulted when the handler did not set a correlation id.
pub const CORRELATION_ID_HEADER: &str = "Correlation-ID";

/// `[10/Oct/2000:13:55:36 +0000]` without the brackets.
const CLF_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

const COMMON_LOG_TEMPLATE: &str = "%s - %s [%s] \"%s %s %s\" %s %s";
const COMBINED_LOG_TEMPLATE: &str = "%s - %s [%s] \"%s %s %s\" %s %s \"%s\" \"%s\"";

/// Everything the access loggers need to know about a finished request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Request target as received: path plus optional query.
    pub uri: Uri,
    /// `http` or `https`.
    pub protocol: String,
    pub remote_ip: Option<IpAddr>,
    pub headers: HeaderMap,
    pub version: Version,
    pub status: StatusCode,
    /// Time spent handling the request.
    pub duration: Duration,
    /// When the server started reading the request.
    pub start_time: Option<DateTime<Utc>>,
    /// Start time captured by an [`AccessLogRecorder`]; preferred over `start_time`.
    pub request_start_time: Option<DateTime<Utc>>,
    /// Body bytes flushed, known only when an [`AccessLogRecorder`] was used.
    pub response_bytes_written: Option<u64>,
    pub current_user: Option<String>,
    /// Correlation id set by the handler; wins over the request header.
    pub correlation_id: Option<String>,
}

impl Default for RequestDescriptor {
    fn default() -> Self {
        Self::new(Method::GET, Uri::default())
    }
}

impl RequestDescriptor {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            protocol: "http".to_string(),
            remote_ip: None,
            headers: HeaderMap::new(),
            version: Version::HTTP_11,
            status: StatusCode::OK,
            duration: Duration::ZERO,
            start_time: None,
            request_start_time: None,
            response_bytes_written: None,
            current_user: None,
            correlation_id: None,
        }
    }

    /// Capture method, target, version and headers of an incoming request.
    pub fn from_request<B>(request: &http::Request<B>) -> Self {
        let mut descriptor = Self::new(request.method().clone(), request.uri().clone());
        descriptor.version = request.version();
        descriptor.headers = request.headers().clone();
        if let Some(scheme) = request.uri().scheme_str() {
            descriptor.protocol = scheme.to_string();
        }
        descriptor
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_remote_ip(mut self, remote_ip: IpAddr) -> Self {
        self.remote_ip = Some(remote_ip);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_current_user(mut self, user: impl Into<String>) -> Self {
        self.current_user = Some(user.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Take the start time and byte count collected by `recorder`.
    ///
    /// The duration becomes the time elapsed on the recorder unless one was
    /// already set with [`RequestDescriptor::with_duration`].
    pub fn with_recording(mut self, recorder: &AccessLogRecorder) -> Self {
        self.request_start_time = Some(recorder.request_start_time());
        self.response_bytes_written = Some(recorder.response_bytes_written());
        if self.duration.is_zero() {
            self.duration = recorder.elapsed();
        }
        self
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path and query exactly as they appear on the request line.
    pub fn request_uri(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    /// Decoded query arguments; repeated names keep every value in order.
    pub fn query_arguments(&self) -> BTreeMap<String, Vec<String>> {
        let mut args: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let Some(query) = self.uri.query() else {
            return args;
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            args.entry(decode_component(name))
                .or_default()
                .push(decode_component(value));
        }
        args
    }

    /// First value of header `name`, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Handler-supplied correlation id, else the `Correlation-ID` header.
    pub fn correlation_id(&self) -> Option<String> {
        self.correlation_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.header(CORRELATION_ID_HEADER))
            .map(|id| id.to_string())
    }

    /// Headers as a JSON object; repeated headers are joined with `,`.
    pub fn headers_document(&self) -> Map<String, Value> {
        let mut doc = Map::new();
        for name in self.headers.keys() {
            let joined = self
                .headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            doc.insert(name.as_str().to_string(), Value::String(joined));
        }
        doc
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

fn level_for_status(status: StatusCode) -> Level {
    match status.as_u16() {
        code if code < 400 => Level::Info,
        code if code < 500 => Level::Warning,
        _ => Level::Error,
    }
}

struct LogInfo {
    level: Level,
    start_time: String,
}

fn extract_log_info(request: &RequestDescriptor) -> LogInfo {
    let start = request
        .request_start_time
        .or(request.start_time)
        .unwrap_or_default();
    LogInfo {
        level: level_for_status(request.status),
        start_time: start.format(CLF_TIME_FORMAT).to_string(),
    }
}

fn dash_or(value: Option<String>) -> Value {
    Value::String(value.filter(|v| !v.is_empty()).unwrap_or_else(|| "-".to_string()))
}

fn null_or<T: Into<Value>>(value: Option<T>) -> Value {
    value.map(Into::into).unwrap_or(Value::Null)
}

/// Access log layouts selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessLogFormat {
    Json,
    Common,
    Combined,
}

impl FromStr for AccessLogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(AccessLogFormat::Json),
            "common" | "clf" => Ok(AccessLogFormat::Common),
            "combined" => Ok(AccessLogFormat::Combined),
            _ => Err(ConfigError::UnknownAccessLogFormat(s.to_string())),
        }
    }
}

impl fmt::Display for AccessLogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessLogFormat::Json => "json",
            AccessLogFormat::Common => "common",
            AccessLogFormat::Combined => "combined",
        })
    }
}

/// Settings shared by all access log layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogConfig {
    /// Environment variable read on every JSON record for the `environment` field.
    pub environment_var: String,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            environment_var: ENVIRONMENT_ENV.to_string(),
        }
    }
}

/// Builds access records and hands them to a [`RecordSink`].
#[derive(Debug, Clone, Default)]
pub struct AccessLogger<S = TracingSink> {
    sink: S,
    config: AccessLogConfig,
}

impl AccessLogger<TracingSink> {
    /// Logger that emits through `tracing`.
    pub fn new() -> Self {
        Self::with_sink(TracingSink)
    }
}

impl<S: RecordSink> AccessLogger<S> {
    pub fn with_sink(sink: S) -> Self {
        Self {
            sink,
            config: AccessLogConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AccessLogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn config(&self) -> &AccessLogConfig {
        &self.config
    }

    /// Record with an empty message whose extras form the JSON access document.
    pub fn json_record(&self, request: &RequestDescriptor) -> LogRecord {
        let info = extract_log_info(request);
        let query_args: Map<String, Value> = request
            .query_arguments()
            .into_iter()
            .map(|(name, values)| (name, Value::from(values)))
            .collect();

        LogRecord::new(ACCESS_LOGGER, info.level, "")
            .with_extra("correlation_id", null_or(request.correlation_id()))
            .with_extra("duration", request.duration.as_micros() as f64 / 1000.0)
            .with_extra("headers", Value::Object(request.headers_document()))
            .with_extra("method", request.method.as_str())
            .with_extra("path", request.path())
            .with_extra("protocol", request.protocol.as_str())
            .with_extra("query_args", Value::Object(query_args))
            .with_extra("remote_ip", null_or(request.remote_ip.map(|ip| ip.to_string())))
            .with_extra("status_code", request.status.as_u16())
            .with_extra(
                "environment",
                null_or(std::env::var(&self.config.environment_var).ok()),
            )
    }

    /// NCSA Common Log Format record.
    pub fn common_record(&self, request: &RequestDescriptor) -> LogRecord {
        let info = extract_log_info(request);
        LogRecord::new(ACCESS_LOGGER, info.level, COMMON_LOG_TEMPLATE)
            .with_args(common_args(request, &info))
    }

    /// Apache combined log format record: common fields plus referer and user agent.
    pub fn combined_record(&self, request: &RequestDescriptor) -> LogRecord {
        let info = extract_log_info(request);
        let mut args = common_args(request, &info);
        args.push(dash_or(request.header("Referer").map(str::to_string)));
        args.push(dash_or(request.header("User-Agent").map(str::to_string)));
        LogRecord::new(ACCESS_LOGGER, info.level, COMBINED_LOG_TEMPLATE).with_args(args)
    }

    pub fn log_json(&self, request: &RequestDescriptor) {
        self.sink.emit(self.json_record(request));
    }

    pub fn common_log_format(&self, request: &RequestDescriptor) {
        self.sink.emit(self.common_record(request));
    }

    pub fn combined_log_format(&self, request: &RequestDescriptor) {
        self.sink.emit(self.combined_record(request));
    }

    pub fn log(&self, format: AccessLogFormat, request: &RequestDescriptor) {
        match format {
            AccessLogFormat::Json => self.log_json(request),
            AccessLogFormat::Common => self.common_log_format(request),
            AccessLogFormat::Combined => self.combined_log_format(request),
        }
    }
}

fn common_args(request: &RequestDescriptor, info: &LogInfo) -> Vec<Value> {
    vec![
        dash_or(request.remote_ip.map(|ip| ip.to_string())),
        dash_or(request.current_user.clone()),
        Value::String(info.start_time.clone()),
        Value::from(request.method.as_str()),
        Value::from(request.request_uri()),
        Value::String(format!("{:?}", request.version)),
        Value::from(request.status.as_u16()),
        request
            .response_bytes_written
            .map(Value::from)
            .unwrap_or_else(|| Value::from("-")),
    ]
}

/// Log `request` as a JSON access document through `tracing`.
pub fn log_json(request: &RequestDescriptor) {
    AccessLogger::new().log_json(request)
}

/// Log `request` in the NCSA Common Log Format through `tracing`.
///
/// `127.0.0.1 - frank [10/Oct/2000:13:55:36 +0000] "GET /apache_pb.gif HTTP/1.0" 200 2326`
///
/// The byte count is `-` unless an [`AccessLogRecorder`] was applied.
pub fn common_log_format(request: &RequestDescriptor) {
    AccessLogger::new().common_log_format(request)
}

/// Log `request` in the Apache combined log format through `tracing`.
pub fn combined_log_format(request: &RequestDescriptor) {
    AccessLogger::new().combined_log_format(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_codes_map_to_levels() {
        assert_eq!(level_for_status(StatusCode::OK), Level::Info);
        assert_eq!(level_for_status(StatusCode::SEE_OTHER), Level::Info);
        assert_eq!(level_for_status(StatusCode::BAD_REQUEST), Level::Warning);
        assert_eq!(level_for_status(StatusCode::from_u16(499).unwrap()), Level::Warning);
        assert_eq!(level_for_status(StatusCode::INTERNAL_SERVER_ERROR), Level::Error);
        assert_eq!(level_for_status(StatusCode::from_u16(599).unwrap()), Level::Error);
    }

    #[test]
    fn start_time_prefers_recorder_then_request_then_epoch() {
        let request = RequestDescriptor::default();
        assert_eq!(extract_log_info(&request).start_time, "01/Jan/1970:00:00:00 +0000");

        let request = request.with_start_time(Utc.with_ymd_and_hms(2000, 10, 10, 13, 55, 36).unwrap());
        assert_eq!(extract_log_info(&request).start_time, "10/Oct/2000:13:55:36 +0000");

        let mut request = request;
        request.request_start_time = Some(Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap());
        assert_eq!(extract_log_info(&request).start_time, "04/Mar/2021:05:06:07 +0000");
    }

    #[test]
    fn recording_supplies_duration_unless_already_set() {
        let recorder = AccessLogRecorder::new();
        std::thread::sleep(Duration::from_millis(5));
        recorder.record_flush([b"abc".as_slice()]);

        let request = RequestDescriptor::default().with_recording(&recorder);
        assert!(request.duration >= Duration::from_millis(5));
        assert_eq!(request.response_bytes_written, Some(3));

        let request = RequestDescriptor::default()
            .with_duration(Duration::from_micros(1500))
            .with_recording(&recorder);
        assert_eq!(request.duration, Duration::from_micros(1500));
    }

    #[test]
    fn query_arguments_are_decoded() {
        let uri: Uri = "/search?q=something%20bad%20happened&tag=a&tag=b+c&flag".parse().unwrap();
        let args = RequestDescriptor::new(Method::GET, uri).query_arguments();
        assert_eq!(args["q"], vec!["something bad happened"]);
        assert_eq!(args["tag"], vec!["a", "b c"]);
        assert_eq!(args["flag"], vec![""]);
    }

    #[test]
    fn handler_correlation_id_wins_over_header() {
        let request = RequestDescriptor::default().with_header(
            HeaderName::from_static("correlation-id"),
            HeaderValue::from_static("from-header"),
        );
        assert_eq!(request.correlation_id().as_deref(), Some("from-header"));

        let request = request.with_correlation_id("from-handler");
        assert_eq!(request.correlation_id().as_deref(), Some("from-handler"));

        let request = request.with_correlation_id("");
        assert_eq!(request.correlation_id().as_deref(), Some("from-header"));
    }

    #[test]
    fn access_log_format_parses_names() {
        assert_eq!("json".parse::<AccessLogFormat>(), Ok(AccessLogFormat::Json));
        assert_eq!("Common".parse::<AccessLogFormat>(), Ok(AccessLogFormat::Common));
        assert_eq!(" combined ".parse::<AccessLogFormat>(), Ok(AccessLogFormat::Combined));
        assert_eq!(
            "xml".parse::<AccessLogFormat>(),
            Err(ConfigError::UnknownAccessLogFormat("xml".to_string()))
        );
    }

    #[test]
    fn from_request_copies_request_line_and_headers() {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("https://example.com/items?id=7")
            .version(Version::HTTP_10)
            .header("User-Agent", "curl/8.0")
            .body(())
            .unwrap();
        let descriptor = RequestDescriptor::from_request(&request);
        assert_eq!(descriptor.method, Method::POST);
        assert_eq!(descriptor.protocol, "https");
        assert_eq!(descriptor.path(), "/items");
        assert_eq!(descriptor.request_uri(), "/items?id=7");
        assert_eq!(descriptor.header("user-agent"), Some("curl/8.0"));
        assert_eq!(format!("{:?}", descriptor.version), "HTTP/1.0");
    }
}
