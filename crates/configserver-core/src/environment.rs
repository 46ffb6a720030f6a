// ABOUTME: Wire model for the configuration environment served to clients.
// ABOUTME: An Environment is an ordered list of flattened property sources, most specific first.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One file's worth of flattened properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySource {
    /// Origin of the properties, e.g. `file:/etc/config/orders-dev.yml`.
    pub name: String,
    pub source: Map<String, Value>,
}

/// The resolved configuration for an application, profile list, and label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: String,
    pub profiles: Vec<String>,
    pub label: Option<String>,
    pub version: Option<String>,
    pub state: Option<String>,
    pub property_sources: Vec<PropertySource>,
}

impl Environment {
    /// Create an environment with no property sources.
    pub fn new(name: impl Into<String>, profiles: Vec<String>, label: Option<String>) -> Self {
        Self {
            name: name.into(),
            profiles,
            label,
            version: None,
            state: None,
            property_sources: Vec::new(),
        }
    }

    /// Look up a key, honoring precedence: the first source that defines it wins.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.property_sources
            .iter()
            .find_map(|source| source.source.get(key))
    }
}
