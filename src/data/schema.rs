//! Translation of datapackage descriptors into [`RecordTemplate`]s.
//!
//! Two descriptor layouts are in circulation:
//!
//! * **Legacy** – metadata (`system`, `source`, `figure description`, ...)
//!   sits at the top level of the descriptor and electrodes are a mapping
//!   keyed by electrode name.
//! * **Resource** – metadata lives under `resources[].metadata.echemdb` and
//!   electrodes are a list of named descriptions.
//!
//! Both end up as the same metadata tree, with electrodes as a list.

use std::collections::BTreeMap;

use log::debug;
use serde_json::Value as JsonValue;

use super::model::{MetadataValue, RawField, RecordTemplate};
use crate::config::{Config, SchemaVersion};
use crate::error::{Error, Result};

/// Read identifier, metadata and field descriptions from a descriptor.
pub fn adapt(descriptor: &JsonValue, config: &Config) -> Result<RecordTemplate> {
    let resources = descriptor
        .get("resources")
        .and_then(JsonValue::as_array)
        .filter(|resources| !resources.is_empty())
        .ok_or_else(|| Error::schema("descriptor has no resources"))?;

    let resource = resources
        .iter()
        .find(|r| r.get("name").and_then(JsonValue::as_str) == Some(config.resource_name.as_str()))
        .unwrap_or(&resources[0]);

    let identifier = descriptor
        .get("name")
        .and_then(JsonValue::as_str)
        .or_else(|| resources[0].get("name").and_then(JsonValue::as_str))
        .ok_or_else(|| Error::schema("descriptor has neither a name nor a named resource"))?
        .to_string();

    let embedded = resource
        .pointer("/metadata/echemdb")
        .filter(|m| m.is_object());
    let legacy = match config.schema_version {
        SchemaVersion::Auto => embedded.is_none(),
        SchemaVersion::Legacy => true,
        SchemaVersion::Resource => false,
    };
    debug!(
        "{identifier}: reading {} descriptor",
        if legacy { "legacy" } else { "resource" }
    );

    let mut metadata = if legacy {
        let top_level = descriptor
            .as_object()
            .ok_or_else(|| Error::schema("descriptor is not a JSON object"))?;
        MetadataValue::Map(
            top_level
                .iter()
                .filter(|(key, _)| key.as_str() != "resources")
                .map(|(key, value)| (key.clone(), MetadataValue::from(value)))
                .collect(),
        )
    } else {
        let embedded = embedded.ok_or_else(|| {
            Error::schema(format!("{identifier}: resource has no 'metadata.echemdb'"))
        })?;
        MetadataValue::from(embedded)
    };
    if legacy {
        electrodes_as_list(&mut metadata);
    }

    let original_units = original_units(&metadata);
    let fields = resource
        .pointer("/schema/fields")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| Error::schema(format!("{identifier}: resource has no schema fields")))?
        .iter()
        .map(|field| read_field(field, &original_units))
        .collect::<Result<Vec<_>>>()?;

    Ok(RecordTemplate {
        identifier,
        metadata,
        fields,
    })
}

fn read_field(field: &JsonValue, original_units: &BTreeMap<String, String>) -> Result<RawField> {
    let obj = field
        .as_object()
        .ok_or_else(|| Error::schema("schema field is not a JSON object"))?;
    let name = obj
        .get("name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::schema("schema field without a name"))?;
    let unit = obj.get("unit").and_then(JsonValue::as_str).unwrap_or("");

    let mut raw = RawField::new(name, unit);
    raw.original_unit = original_units.get(name).cloned();
    raw.attributes = obj
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "name" | "unit"))
        .map(|(key, value)| (key.clone(), MetadataValue::from(value)))
        .collect();
    Ok(raw)
}

/// Units of the figure the data was digitized from, by field name.
fn original_units(metadata: &MetadataValue) -> BTreeMap<String, String> {
    metadata
        .get("figure description")
        .and_then(|figure| figure.get("fields"))
        .and_then(MetadataValue::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(|field| {
            let name = field.get("name")?.as_str()?;
            let unit = field.get("unit")?.as_str()?;
            Some((name.to_string(), unit.to_string()))
        })
        .collect()
}

/// Rewrite `system.electrodes` from `{"WE": {...}}` to `[{"name": "WE", ...}]`.
///
/// Metadata maps are sorted, so the resulting list follows the alphabetical
/// order of the keys and not their order in the descriptor.
fn electrodes_as_list(metadata: &mut MetadataValue) {
    let MetadataValue::Map(root) = metadata else {
        return;
    };
    let Some(MetadataValue::Map(system)) = root.get_mut("system") else {
        return;
    };
    let Some(electrodes) = system.get_mut("electrodes") else {
        return;
    };
    if let MetadataValue::Map(keyed) = electrodes {
        let list = std::mem::take(keyed)
            .into_iter()
            .map(|(name, electrode)| match electrode {
                MetadataValue::Map(mut description) => {
                    description
                        .entry("name".to_string())
                        .or_insert(MetadataValue::String(name));
                    MetadataValue::Map(description)
                }
                other => other,
            })
            .collect();
        *electrodes = MetadataValue::List(list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource_descriptor() -> JsonValue {
        json!({
            "name": "alves_2011_electrochemistry_6010_f1a_solid",
            "resources": [{
                "name": "echemdb",
                "schema": {"fields": [
                    {"name": "t", "type": "number", "unit": "s"},
                    {"name": "E", "type": "number", "unit": "V", "reference": "RHE"},
                    {"name": "j", "type": "number", "unit": "A / m2"},
                ]},
                "metadata": {"echemdb": {
                    "system": {"electrodes": [
                        {"name": "WE", "function": "working electrode", "material": "Ru"},
                    ]},
                    "source": {"citation key": "alves_2011_electrochemistry_6010"},
                    "figure description": {"fields": [
                        {"name": "E", "unit": "V", "reference": "RHE"},
                        {"name": "j", "unit": "mA / cm2"},
                    ]},
                }},
            }],
        })
    }

    fn legacy_descriptor() -> JsonValue {
        json!({
            "resources": [{
                "name": "engstfeld_2018_polycrystalline_17743_f4b_1",
                "schema": {"fields": [
                    {"name": "E", "unit": "V"},
                    {"name": "j", "unit": "A / m2"},
                ]},
            }],
            "system": {"electrodes": {
                "WE": {"function": "working electrode", "material": "Cu"},
                "REF": {"function": "reference electrode", "type": "RHE"},
            }},
            "source": {"citation key": "engstfeld_2018_polycrystalline_17743"},
            "figure description": {"fields": [{"name": "j", "unit": "uA / cm2"}]},
        })
    }

    #[test]
    fn test_resource_layout() {
        let template = adapt(&resource_descriptor(), &Config::default()).unwrap();
        assert_eq!(template.identifier, "alves_2011_electrochemistry_6010_f1a_solid");
        assert_eq!(template.fields.len(), 3);
        assert_eq!(template.fields[0].original_unit, None);
        assert_eq!(template.fields[2].original_unit.as_deref(), Some("mA / cm2"));
        assert_eq!(
            template.fields[1].attributes.get("reference"),
            Some(&MetadataValue::from("RHE"))
        );
        assert_eq!(
            template.metadata.get_path("system.electrodes.WE.material"),
            Some(&MetadataValue::from("Ru"))
        );
    }

    #[test]
    fn test_legacy_layout() {
        let template = adapt(&legacy_descriptor(), &Config::default()).unwrap();
        assert_eq!(template.identifier, "engstfeld_2018_polycrystalline_17743_f4b_1");
        let electrodes = template
            .metadata
            .get_path("system.electrodes")
            .and_then(MetadataValue::as_list)
            .unwrap();
        assert_eq!(electrodes.len(), 2);
        let names: Vec<_> = electrodes
            .iter()
            .filter_map(|e| e.get("name").and_then(MetadataValue::as_str))
            .collect();
        assert_eq!(names, vec!["REF", "WE"]);
        assert_eq!(
            template.metadata.get_path("system.electrodes.WE.material"),
            Some(&MetadataValue::from("Cu"))
        );
        assert!(template.metadata.get("resources").is_none());
        assert_eq!(template.fields[1].original_unit.as_deref(), Some("uA / cm2"));
    }

    #[test]
    fn test_forced_version_mismatch() {
        let config = Config {
            schema_version: SchemaVersion::Resource,
            ..Config::default()
        };
        assert!(matches!(
            adapt(&legacy_descriptor(), &config),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_descriptor_without_resources() {
        assert!(adapt(&json!({"name": "x"}), &Config::default()).is_err());
        assert!(adapt(&json!({"name": "x", "resources": []}), &Config::default()).is_err());
    }
}
