use http::header::{REFERER, USER_AGENT};
use http::{HeaderValue, Method, StatusCode};
use std::net::{IpAddr, Ipv4Addr};

use tracing_log_format::access::{AccessLogFormat, AccessLogger, RequestDescriptor};
use tracing_log_format::init::{init_logging_with_config, LayerConfig};
use tracing_log_format::recording::AccessLogRecorder;

fn main() {
    if let Err(e) = init_logging_with_config(LayerConfig::default()) {
        eprintln!("failed to initialize logging: {}", e);
        return;
    }

    // What a request handler would do: start recording on construction and
    // count every flushed chunk.
    let recorder = AccessLogRecorder::new();
    recorder.record_flush([b"GIF89a".as_slice(), &[0u8; 2320][..]]);

    let request = RequestDescriptor::new(Method::GET, "/apache_pb.gif?size=small".parse().unwrap_or_default())
        .with_status(StatusCode::OK)
        .with_remote_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_current_user("frank")
        .with_header(REFERER, HeaderValue::from_static("http://www.example.com/start.html"))
        .with_header(USER_AGENT, HeaderValue::from_static("Mozilla/4.08 [en] (Win98; I ;Nav)"))
        .with_recording(&recorder);

    let logger = AccessLogger::new();
    for format in [AccessLogFormat::Common, AccessLogFormat::Combined, AccessLogFormat::Json] {
        logger.log(format, &request);
    }

    let failed = request.with_status(StatusCode::SERVICE_UNAVAILABLE);
    tracing_log_format::access::common_log_format(&failed);
}
