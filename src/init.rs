use crate::encoder::EncoderConfig;
use crate::env::{env_opt, LOG_CONTEXT_PROPERTIES_ENV, LOG_FORMAT_ENV, LOG_JSON_INDENT_ENV, LOG_UTC_ENV};
use crate::error::{ConfigError, InitError};
use crate::filter::ContextFilter;
use crate::formatter::{JsonFormatter, RecordFormatter};
use crate::layer::FormatLayer;
use crate::template::TemplateFormatter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// How each record is rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON document per line, see [`JsonFormatter`].
    Json,
    /// A `%(name)s` template, see [`TemplateFormatter`].
    Template(String),
}

/// Configuration of the logging layer.
///
/// **Fields**
/// - `format`: JSON documents or a text template.
/// - `properties`: names every record is guaranteed to carry (backfilled
///   with `null` by a [`ContextFilter`]).
/// - `encoder`: separators and indent of JSON output.
/// - `use_utc`: render timestamps in UTC rather than local time.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub format: OutputFormat,
    pub properties: Vec<String>,
    pub encoder: EncoderConfig,
    pub use_utc: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Json,
            properties: Vec::new(),
            encoder: EncoderConfig::default(),
            use_utc: false,
        }
    }
}

impl LayerConfig {
    /// Build a config from `LOG_FORMAT`, `LOG_CONTEXT_PROPERTIES`,
    /// `LOG_JSON_INDENT` and `LOG_UTC`, falling back to defaults for
    /// unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_opt)
    }

    /// Same as [`LayerConfig::from_env`] with a custom variable lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            config.format = if format.trim().eq_ignore_ascii_case("json") {
                OutputFormat::Json
            } else {
                OutputFormat::Template(format)
            };
        }

        if let Some(properties) = lookup(LOG_CONTEXT_PROPERTIES_ENV) {
            config.properties = properties
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| p.to_string())
                .collect();
        }

        if let Some(indent) = lookup(LOG_JSON_INDENT_ENV) {
            let spaces = indent
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidIndent(indent.clone()))?;
            config.encoder.indent = Some(spaces);
        }

        if let Some(utc) = lookup(LOG_UTC_ENV) {
            config.use_utc = matches!(utc.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    pub fn context_filter(&self) -> ContextFilter {
        ContextFilter::new("", self.properties.iter().cloned())
    }

    pub fn build_formatter(&self) -> Result<Box<dyn RecordFormatter>, ConfigError> {
        match &self.format {
            OutputFormat::Json => Ok(Box::new(
                JsonFormatter::new()
                    .with_encoder(self.encoder.clone())
                    .with_utc(self.use_utc),
            )),
            OutputFormat::Template(template) => {
                let formatter = TemplateFormatter::new(template.clone())
                    .map_err(|e| ConfigError::InvalidTemplate(e.to_string()))?;
                Ok(Box::new(formatter.with_utc(self.use_utc)))
            }
        }
    }

    /// Layer writing formatted records to stdout.
    pub fn build_layer(&self) -> Result<FormatLayer<Box<dyn RecordFormatter>>, ConfigError> {
        Ok(FormatLayer::new(self.build_formatter()?).with_filter(self.context_filter()))
    }
}

/// Initialize the global `tracing` subscriber with the provided
/// [`LayerConfig`].
///
/// **Effects**
///
/// Installs a [`Registry`] combined with a [`FormatLayer`] as the global
/// default subscriber, so every `tracing` event in the process (access
/// records included) is written to stdout in the configured format.
pub fn init_logging_with_config(config: LayerConfig) -> Result<(), InitError> {
    let layer = config.build_layer()?;
    let subscriber = Registry::default().with(layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Initialize logging from the environment.
///
/// Equivalent to calling [`init_logging_with_config`] with
/// [`LayerConfig::from_env`].
pub fn init_logging() -> Result<(), InitError> {
    init_logging_with_config(LayerConfig::from_env()?)
}
