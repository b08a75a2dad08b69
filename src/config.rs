//! Configuration for PQL translation and URL binding.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Projections accepted by `includes` unless configured otherwise.
pub const DEFAULT_INCLUDE_FIELDS: [&str; 6] = [
    "transcripts",
    "consequences",
    "occurrences",
    "specimen",
    "observation",
    "projects",
];

/// Configuration shared by the translation service, the builder and the
/// URL adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PqlConfig {
    /// Name of the query-string parameter holding PQL.
    pub parameter_name: String,

    /// Always emit `select(*)`, even when the input did not carry it.
    pub select_all_by_default: bool,

    /// Categories emitted first, in this order. Others follow in
    /// first-seen order.
    pub category_order: Vec<String>,

    /// Fields `includes` may add to the projection.
    pub include_fields: Vec<String>,
}

impl Default for PqlConfig {
    fn default() -> Self {
        PqlConfig {
            parameter_name: "query".to_string(),
            select_all_by_default: false,
            category_order: Vec::new(),
            include_fields: DEFAULT_INCLUDE_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl PqlConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from JSON. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the query-string parameter name.
    pub fn with_parameter_name<S: Into<String>>(mut self, name: S) -> Self {
        self.parameter_name = name.into();
        self
    }

    /// Emit `select(*)` on every serialized query.
    pub fn with_select_all_by_default(mut self, enabled: bool) -> Self {
        self.select_all_by_default = enabled;
        self
    }

    /// Set the canonical category order.
    pub fn with_category_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category_order = order.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the accepted projection fields.
    pub fn with_include_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `field` may be added through `includes`.
    pub fn is_include_field(&self, field: &str) -> bool {
        self.include_fields.iter().any(|f| f == field)
    }
}
