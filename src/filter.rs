use serde_json::Value;
use std::collections::BTreeMap;

use crate::record::LogRecord;

/// Ensures that a set of properties exists on every [`LogRecord`].
///
/// Format strings can then refer to custom properties (for example
/// `%(correlation_id)s`) without failing on records that never set them.
/// A value already present on the record always wins over the default.
#[derive(Debug, Clone, Default)]
pub struct ContextFilter {
    name: String,
    properties: BTreeMap<String, Value>,
}

impl ContextFilter {
    /// Filter that backfills each of `properties` with `null`.
    pub fn new<I, S>(name: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ContextFilter {
            name: name.into(),
            properties: properties
                .into_iter()
                .map(|p| (p.into(), Value::Null))
                .collect(),
        }
    }

    /// Filter that backfills each property with its own default value.
    pub fn with_defaults<I, K, V>(name: impl Into<String>, defaults: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        ContextFilter {
            name: name.into(),
            properties: defaults
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Property names mapped to the default each one is backfilled with.
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Replace the property set. `None` clears it to an empty mapping.
    pub fn set_properties(&mut self, properties: Option<BTreeMap<String, Value>>) {
        self.properties = properties.unwrap_or_default();
    }

    /// Replace the property set with names that default to `null`.
    pub fn set_property_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = names.into_iter().map(|n| (n.into(), Value::Null)).collect();
    }

    /// Add every missing property to `record`.
    ///
    /// Always returns `true`; this filter never suppresses a record.
    pub fn filter(&self, record: &mut LogRecord) -> bool {
        for (property, default) in &self.properties {
            if !record.has_attribute(property) {
                record.set_extra(property.clone(), default.clone());
            }
        }
        true
    }
}
