use serde_json::Value;

use crate::conversion::ConversionSpec;
use crate::error::FormatError;
use crate::formatter::{format_timestamp, RecordFormatter, DEFAULT_TIME_FORMAT};
use crate::record::LogRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { name: String, spec: ConversionSpec },
}

/// Plain-text formatter driven by a `%(name)s` template.
///
/// Each placeholder takes the usual conversion specifier after the name,
/// e.g. `%(levelno)5d` or `%(name)-12s`.
///
/// Besides record attributes and extras the template may use `message`
/// (the interpolated message) and `asctime` (the formatted timestamp).
/// Referring to an attribute the record does not have is an error; put a
/// [`crate::filter::ContextFilter`] in front to guarantee presence.
#[derive(Debug, Clone)]
pub struct TemplateFormatter {
    template: String,
    segments: Vec<Segment>,
    time_format: String,
    use_utc: bool,
}

impl TemplateFormatter {
    pub fn new(template: impl Into<String>) -> Result<Self, FormatError> {
        let template = template.into();
        let segments = parse(&template)?;
        Ok(Self {
            template,
            segments,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            use_utc: false,
        })
    }

    pub fn with_time_format(mut self, pattern: impl Into<String>) -> Self {
        self.time_format = pattern.into();
        self
    }

    pub fn with_utc(mut self, use_utc: bool) -> Self {
        self.use_utc = use_utc;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

fn parse(template: &str) -> Result<Vec<Segment>, FormatError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => literal.push('%'),
            Some('(') => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(')') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(FormatError::UnsupportedPlaceholder('(')),
                    }
                }
                let spec = ConversionSpec::parse(&mut chars)?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field { name, spec });
            }
            Some(other) => return Err(FormatError::UnsupportedPlaceholder(other)),
            None => return Err(FormatError::UnsupportedPlaceholder('%')),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

impl RecordFormatter for TemplateFormatter {
    fn format(&self, record: &LogRecord) -> Result<String, FormatError> {
        let mut out = String::with_capacity(self.template.len() + record.msg.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { name, spec } => {
                    let value = match name.as_str() {
                        "message" => Value::String(record.get_message()?),
                        "asctime" => Value::String(format_timestamp(
                            &record.timestamp,
                            &self.time_format,
                            self.use_utc,
                        )?),
                        _ => record
                            .attribute(name)
                            .ok_or_else(|| FormatError::MissingKey(name.clone()))?,
                    };
                    out.push_str(&spec.render(&value));
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ContextFilter;
    use crate::record::Level;

    const CID_FORMAT: &str = "%(message)s {CID %(correlation_id)s}";

    #[test]
    fn missing_property_is_an_error_without_filter() {
        let formatter = TemplateFormatter::new(CID_FORMAT).unwrap();
        let record = LogRecord::new("test-logger", Level::Error, "error message");
        match formatter.format(&record) {
            Err(FormatError::MissingKey(name)) => assert_eq!(name, "correlation_id"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn filter_backfills_property_for_template() {
        let formatter = TemplateFormatter::new(CID_FORMAT).unwrap();
        let filter = ContextFilter::new("", ["correlation_id"]);

        let mut record = LogRecord::new("test-logger", Level::Error, "error message");
        filter.filter(&mut record);
        assert_eq!(formatter.format(&record).unwrap(), "error message {CID null}");

        let mut record = LogRecord::new("test-logger", Level::Error, "error message")
            .with_extra("correlation_id", "CORRELATION-ID");
        filter.filter(&mut record);
        assert_eq!(
            formatter.format(&record).unwrap(),
            "error message {CID CORRELATION-ID}"
        );
    }

    #[test]
    fn builtins_and_literal_percent_render() {
        let formatter = TemplateFormatter::new("%(level)s:%(name)s:%(levelno)d 100%% %(message)r").unwrap();
        let record = LogRecord::new("svc", Level::Warning, "careful");
        assert_eq!(
            formatter.format(&record).unwrap(),
            "WARNING:svc:30 100% \"careful\""
        );
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(TemplateFormatter::new("%(unterminated").is_err());
        assert!(TemplateFormatter::new("%(name)q").is_err());
        assert!(TemplateFormatter::new("%(name)").is_err());
        assert!(TemplateFormatter::new("trailing %").is_err());
    }

    #[test]
    fn conversion_specifiers_apply_to_every_field() {
        let formatter = TemplateFormatter::new("%(levelno)5d|%(name)-6s|%(message)r|%(asctime).10s")
            .unwrap()
            .with_utc(true);
        let record = LogRecord::new("svc", Level::Info, "hello")
            .with_timestamp(chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2024, 5, 1, 13, 55, 36).unwrap());
        assert_eq!(
            formatter.format(&record).unwrap(),
            "   20|svc   |\"hello\"|2024-05-01"
        );
    }
}
