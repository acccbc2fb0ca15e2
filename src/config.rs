use serde::{Deserialize, Serialize};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Loader configuration
// ---------------------------------------------------------------------------

/// Which layout of datapackage descriptor the schema adapter should expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVersion {
    /// Pick `Resource` when the data resource carries `metadata.echemdb`,
    /// `Legacy` otherwise.
    #[default]
    Auto,
    /// Metadata at the top level of the descriptor, electrodes keyed by name.
    Legacy,
    /// Metadata under `resources[].metadata.echemdb`, electrodes as a list.
    Resource,
}

/// Settings shared by the schema adapter, the loaders and collection
/// construction.
///
/// ```json
/// { "resource_name": "echemdb", "schema_version": "auto", "sort_by_identifier": false }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the resource holding the measurement table. When no resource
    /// has this name the first resource is used.
    pub resource_name: String,
    /// Descriptor layout.
    pub schema_version: SchemaVersion,
    /// Iterate collections sorted by identifier instead of loader order.
    pub sort_by_identifier: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resource_name: "echemdb".to_string(),
            schema_version: SchemaVersion::Auto,
            sort_by_identifier: false,
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = Config::from_json_str(r#"{ "sort_by_identifier": true }"#).unwrap();
        assert_eq!(config.resource_name, "echemdb");
        assert_eq!(config.schema_version, SchemaVersion::Auto);
        assert!(config.sort_by_identifier);
    }

    #[test]
    fn test_schema_version_spelling() {
        let config = Config::from_json_str(r#"{ "schema_version": "legacy" }"#).unwrap();
        assert_eq!(config.schema_version, SchemaVersion::Legacy);
        assert!(Config::from_json_str(r#"{ "schema_version": "v3" }"#).is_err());
    }
}
