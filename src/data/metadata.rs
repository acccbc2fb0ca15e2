use std::collections::BTreeMap;

use super::model::{lookup, MetadataValue};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Electrode
// ---------------------------------------------------------------------------

/// One electrode of the experimental system.
#[derive(Debug, Clone, PartialEq)]
pub struct Electrode {
    name: String,
    attributes: BTreeMap<String, MetadataValue>,
}

impl Electrode {
    fn from_map(attributes: BTreeMap<String, MetadataValue>) -> Result<Self> {
        let name = lookup(&attributes, "name")
            .and_then(MetadataValue::as_str)
            .ok_or_else(|| Error::schema("electrode without a 'name'"))?
            .to_string();
        Ok(Self { name, attributes })
    }

    /// Short label such as `WE`, `CE` or `REF`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role in the cell, e.g. `working electrode`.
    pub fn function(&self) -> Option<&str> {
        self.get_str("function")
    }

    pub fn material(&self) -> Option<&str> {
        self.get_str("material")
    }

    pub fn crystallographic_orientation(&self) -> Option<&str> {
        self.get_str("crystallographic orientation")
    }

    /// Any key of the electrode description.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        lookup(&self.attributes, key)
    }

    pub fn attributes(&self) -> &BTreeMap<String, MetadataValue> {
        &self.attributes
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetadataValue::as_str)
    }

    /// Whether `name` designates this electrode, either by its label or by
    /// its function (`working_electrode` matches `working electrode`).
    fn answers_to(&self, name: &str) -> bool {
        fn normalize(s: &str) -> String {
            s.trim().to_lowercase().replace('_', " ")
        }
        self.name == name
            || self
                .function()
                .is_some_and(|function| normalize(function) == normalize(name))
    }
}

// ---------------------------------------------------------------------------
// System and source
// ---------------------------------------------------------------------------

/// The electrochemical system an entry was measured in.
#[derive(Debug, Clone, PartialEq)]
pub struct System {
    electrodes: Vec<Electrode>,
    attributes: BTreeMap<String, MetadataValue>,
}

impl System {
    fn from_map(attributes: BTreeMap<String, MetadataValue>) -> Result<Self> {
        let electrodes = lookup(&attributes, "electrodes")
            .and_then(MetadataValue::as_list)
            .ok_or_else(|| Error::schema("system has no 'electrodes' list"))?
            .iter()
            .map(|electrode| {
                electrode
                    .as_map()
                    .cloned()
                    .ok_or_else(|| Error::schema("electrode description is not a mapping"))
                    .and_then(Electrode::from_map)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            electrodes,
            attributes,
        })
    }

    /// `type` of the system, e.g. `electrochemical`.
    pub fn kind(&self) -> Option<&str> {
        self.get("type").and_then(MetadataValue::as_str)
    }

    /// Electrodes in the order they are listed in the metadata.
    pub fn electrodes(&self) -> &[Electrode] {
        &self.electrodes
    }

    /// First electrode answering to `name`.
    pub fn electrode(&self, name: &str) -> Option<&Electrode> {
        self.electrodes.iter().find(|e| e.answers_to(name))
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        lookup(&self.attributes, key)
    }
}

/// Provenance of an entry: publication and figure it was digitized from.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    citation_key: String,
    attributes: BTreeMap<String, MetadataValue>,
}

impl Source {
    fn from_map(attributes: BTreeMap<String, MetadataValue>) -> Result<Self> {
        let citation_key = lookup(&attributes, "citation key")
            .and_then(MetadataValue::as_str)
            .ok_or_else(|| Error::schema("source has no 'citation key'"))?
            .to_string();
        Ok(Self {
            citation_key,
            attributes,
        })
    }

    /// Key of the publication in the bibliography.
    pub fn citation_key(&self) -> &str {
        &self.citation_key
    }

    pub fn url(&self) -> Option<&str> {
        self.get("url").and_then(MetadataValue::as_str)
    }

    pub fn figure(&self) -> Option<&MetadataValue> {
        self.get("figure")
    }

    pub fn curve(&self) -> Option<&MetadataValue> {
        self.get("curve")
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        lookup(&self.attributes, key)
    }
}

// ---------------------------------------------------------------------------
// Metadata – the whole tree
// ---------------------------------------------------------------------------

/// Read-only metadata of an entry.
///
/// The typed views ([`system`](Self::system), [`source`](Self::source)) and
/// the keyed lookups ([`get`](Self::get), [`get_path`](Self::get_path)) are
/// all derived from the same mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    root: MetadataValue,
    system: System,
    source: Source,
}

impl Metadata {
    /// Validate a metadata tree. It must be a mapping with a `system`
    /// (holding an `electrodes` list of named mappings) and a `source`
    /// (holding a `citation key`).
    pub fn from_value(root: MetadataValue) -> Result<Self> {
        let map = root
            .as_map()
            .ok_or_else(|| Error::schema("metadata is not a mapping"))?;

        let system = lookup(map, "system")
            .and_then(MetadataValue::as_map)
            .ok_or_else(|| Error::schema("metadata has no 'system' mapping"))?;
        let system = System::from_map(system.clone())?;

        let source = lookup(map, "source")
            .and_then(MetadataValue::as_map)
            .ok_or_else(|| Error::schema("metadata has no 'source' mapping"))?;
        let source = Source::from_map(source.clone())?;

        Ok(Self {
            root,
            system,
            source,
        })
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Top-level key, e.g. `get("curation")`.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.root.get(key)
    }

    /// Dotted path, e.g. `get_path("system.electrodes.WE.material")`.
    pub fn get_path(&self, path: &str) -> Option<&MetadataValue> {
        self.root.get_path(path)
    }

    /// The whole tree.
    pub fn as_value(&self) -> &MetadataValue {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> MetadataValue {
        MetadataValue::from(&json!({
            "system": {
                "type": "electrochemical",
                "electrodes": [
                    {"name": "REF", "function": "reference electrode", "type": "RHE"},
                    {"name": "WE", "function": "working electrode", "material": "Ru",
                     "crystallographic orientation": "0001"},
                ],
            },
            "source": {
                "citation key": "alves_2011_electrochemistry_6010",
                "url": "https://doi.org/10.1039/C0CP01001D",
                "figure": "1a",
                "curve": "solid",
            },
            "curation": {"process": [{"role": "curator", "name": "Albert Engstfeld"}]},
        }))
    }

    #[test]
    fn test_typed_accessors() {
        let metadata = Metadata::from_value(sample()).unwrap();
        assert_eq!(metadata.system().kind(), Some("electrochemical"));
        assert_eq!(metadata.system().electrodes().len(), 2);
        assert_eq!(
            metadata.source().citation_key(),
            "alves_2011_electrochemistry_6010"
        );
        assert_eq!(
            metadata.source().url(),
            Some("https://doi.org/10.1039/C0CP01001D")
        );
        assert_eq!(metadata.source().figure(), Some(&MetadataValue::from("1a")));
    }

    #[test]
    fn test_keyed_accessors_agree() {
        let metadata = Metadata::from_value(sample()).unwrap();
        assert_eq!(
            metadata
                .get_path("system.electrodes.WE.material")
                .and_then(MetadataValue::as_str),
            metadata.system().electrode("WE").and_then(Electrode::material)
        );
        assert_eq!(
            metadata.get_path("curation.process.0.role"),
            Some(&MetadataValue::from("curator"))
        );
        assert!(metadata.get("missing").is_none());
    }

    #[test]
    fn test_electrode_by_function() {
        let metadata = Metadata::from_value(sample()).unwrap();
        let we = metadata.system().electrode("working_electrode").unwrap();
        assert_eq!(we.name(), "WE");
        assert_eq!(we.crystallographic_orientation(), Some("0001"));
        assert!(metadata.system().electrode("CE").is_none());
    }

    #[test]
    fn test_schema_violations() {
        let missing_source = MetadataValue::from(&json!({"system": {"electrodes": []}}));
        assert!(matches!(
            Metadata::from_value(missing_source),
            Err(Error::Schema(_))
        ));

        let unnamed_electrode = MetadataValue::from(&json!({
            "system": {"electrodes": [{"material": "Pt"}]},
            "source": {"citation key": "x"},
        }));
        assert!(matches!(
            Metadata::from_value(unnamed_electrode),
            Err(Error::Schema(_))
        ));

        assert!(Metadata::from_value(MetadataValue::Null).is_err());
    }
}
