mod common;

use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::thread;

use common::{with_layer, Buffer};
use tracing_log_format::encoder::EncoderConfig;
use tracing_log_format::filter::ContextFilter;
use tracing_log_format::formatter::{JsonFormatter, RecordFormatter};
use tracing_log_format::layer::FormatLayer;
use tracing_log_format::record::{ExcInfo, Frame, Level, LogRecord};

fn parse(line: &str) -> Map<String, Value> {
    serde_json::from_str(line).unwrap()
}

#[test]
fn encoders_are_independent_per_formatter() {
    let compact = JsonFormatter::new();
    let pretty = JsonFormatter::new().with_encoder(EncoderConfig::new(Some(2), ", ", ": "));
    let record = LogRecord::new("svc", Level::Info, "ready").with_extra("port", 8080);

    let compact_line = compact.format(&record).unwrap();
    let pretty_line = pretty.format(&record).unwrap();

    assert!(!compact_line.contains('\n'));
    assert!(compact_line.contains(r#""port":8080"#));
    assert!(pretty_line.contains("\n  \"port\": 8080"));
    assert_eq!(parse(&compact_line), parse(&pretty_line));
}

#[test]
fn shared_formatter_keeps_documents_apart_across_threads() {
    let formatter = Arc::new(JsonFormatter::new());

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let formatter = Arc::clone(&formatter);
            thread::spawn(move || {
                (0..50)
                    .map(|i| {
                        let record = LogRecord::new("worker", Level::Info, "job %d of %s")
                            .with_args([json!(i), json!(format!("worker-{}", worker))])
                            .with_extra("worker", worker)
                            .with_extra("job", i);
                        (worker, i, formatter.format(&record).unwrap())
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        for (worker, i, line) in handle.join().unwrap() {
            let entry = parse(&line);
            assert_eq!(entry["worker"], json!(worker));
            assert_eq!(entry["job"], json!(i));
            assert_eq!(entry["message"], json!(format!("job {} of worker-{}", i, worker)));
            assert!(!entry.contains_key("traceback"));
        }
    }
}

#[test]
fn exception_info_becomes_traceback() {
    let exc = ExcInfo::new("ValueError", "bad input")
        .with_frame(Frame::new("src/handlers.rs", "handlers::create", 42, "validate(&body)?"));
    let record = LogRecord::new("svc", Level::Error, "request failed").with_exc_info(exc);

    let entry = parse(&JsonFormatter::new().format(&record).unwrap());
    assert_eq!(
        entry["traceback"],
        json!({
            "message": "bad input",
            "stack": [{
                "file": "src/handlers.rs",
                "func": "handlers::create",
                "line": "42",
                "text": "validate(&body)?",
            }],
            "type": "ValueError",
        })
    );
    assert!(!entry.contains_key("exc_info"));
}

#[test]
fn layer_writes_one_document_per_event() {
    let buffer = Buffer::default();
    let layer = FormatLayer::new(JsonFormatter::new().with_utc(true))
        .with_writer(buffer.clone())
        .with_filter(ContextFilter::new("", ["correlation_id", "request_id"]));

    with_layer(layer, || {
        tracing::info!(correlation_id = "abc", "first");
        tracing::warn!(request_id = 7, "second");
    });

    let entries = buffer.json_lines();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["message"], json!("first"));
    assert_eq!(entries[0]["correlation_id"], json!("abc"));
    assert_eq!(entries[0]["request_id"], Value::Null);
    assert_eq!(entries[1]["level"], json!("WARNING"));
    assert_eq!(entries[1]["correlation_id"], Value::Null);
    assert_eq!(entries[1]["request_id"], json!(7));
    for entry in &entries {
        assert!(entry["timestamp"].is_string());
        assert!(entry.contains_key("levelno"));
    }
}
