/// Error type returned when a record cannot be turned into output.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("failed to encode log document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message template {template:?} expects {expected} argument(s), got {given}")]
    Interpolation {
        template: String,
        expected: usize,
        given: usize,
    },

    #[error("unsupported placeholder %{0} in message template")]
    UnsupportedPlaceholder(char),

    #[error("format string refers to missing attribute {0:?}")]
    MissingKey(String),

    #[error("invalid time format {0:?}")]
    TimeFormat(String),

    #[error("failed to write log line: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("global subscriber already installed: {0}")]
    SetGlobalDefault(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Error type returned when parsing configuration values.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown access log format {0:?} (expected json, common or combined)")]
    UnknownAccessLogFormat(String),

    #[error("invalid JSON indent {0:?}")]
    InvalidIndent(String),

    #[error("invalid log format template: {0}")]
    InvalidTemplate(String),
}
