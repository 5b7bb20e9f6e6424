//! Environment variable names used by this crate for configuring the
//! logging layer from services.
//!
//! These are purely helpers; formatters and filters never read the
//! environment themselves, with the exception of the `environment` field
//! of JSON access records.

/// Deployment tag copied into JSON access records, e.g. `production`.
pub const ENVIRONMENT_ENV: &str = "ENVIRONMENT";

/// `json` for JSON documents, anything else is a `%(name)s` template.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Comma-separated properties every record is guaranteed to carry.
pub const LOG_CONTEXT_PROPERTIES_ENV: &str = "LOG_CONTEXT_PROPERTIES";

/// Optional indent (spaces per level) for JSON documents.
pub const LOG_JSON_INDENT_ENV: &str = "LOG_JSON_INDENT";

/// Render timestamps in UTC when set to `1` or `true`.
pub const LOG_UTC_ENV: &str = "LOG_UTC";

/// Read an environment variable, treating unset and empty alike.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
