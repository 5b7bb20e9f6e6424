//! Context filters, JSON record formatting and HTTP access-log lines for
//! services that log through `tracing`.

pub mod error;
pub mod record;
mod conversion;
pub mod filter;
pub mod encoder;
pub mod formatter;
pub mod template;

pub mod access;
pub mod recording;
pub mod sink;
pub mod memory_sink;

pub mod layer;
pub mod init;
pub mod env;
