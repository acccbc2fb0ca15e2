use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{trace, warn};

use super::metadata::{Electrode, Metadata, Source, System};
use super::model::{FieldDescriptor, MetadataValue, RawRecord, Table};
use super::units::UnitRegistry;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// UnitSpec – target units for a rescale
// ---------------------------------------------------------------------------

/// Target units for [`Entry::rescale`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitSpec {
    /// Every field back to the unit it was recorded in.
    Original,
    /// Field name → target unit. Fields not listed keep their unit.
    Units(BTreeMap<String, String>),
}

impl UnitSpec {
    /// Literal accepted by [`FromStr`] for [`UnitSpec::Original`].
    pub const ORIGINAL: &'static str = "original";
}

impl From<BTreeMap<String, String>> for UnitSpec {
    fn from(units: BTreeMap<String, String>) -> Self {
        UnitSpec::Units(units)
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for UnitSpec {
    fn from(units: [(K, V); N]) -> Self {
        UnitSpec::Units(
            units
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Parses `original` or a comma separated list such as `E=mV, j=uA / cm2`.
impl FromStr for UnitSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim() == Self::ORIGINAL {
            return Ok(UnitSpec::Original);
        }
        s.split(',')
            .map(|pair| {
                let (name, unit) = pair.split_once('=').ok_or_else(|| {
                    Error::schema(format!("'{pair}' is not of the form field=unit"))
                })?;
                Ok((name.trim().to_string(), unit.trim().to_string()))
            })
            .collect::<Result<BTreeMap<_, _>>>()
            .map(UnitSpec::Units)
    }
}

// ---------------------------------------------------------------------------
// Entry – one measurement
// ---------------------------------------------------------------------------

/// One electrochemical measurement: metadata plus a table of signals.
///
/// Entries never change after construction. [`rescale`](Self::rescale)
/// returns a new entry that shares the metadata and every column it did
/// not convert.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    identifier: String,
    metadata: Arc<Metadata>,
    fields: Vec<FieldDescriptor>,
    table: Table,
}

impl Entry {
    /// Assemble an entry. Fails unless `fields` and the table's columns
    /// correspond one to one, in the same order.
    pub fn new(
        identifier: impl Into<String>,
        metadata: Metadata,
        fields: Vec<FieldDescriptor>,
        table: Table,
    ) -> Result<Self> {
        let identifier = identifier.into();
        if identifier.is_empty() {
            return Err(Error::schema("entry without identifier"));
        }

        let field_names: Vec<&str> = fields.iter().map(FieldDescriptor::name).collect();
        let column_names: Vec<&str> = table.names().iter().map(String::as_str).collect();
        if field_names != column_names {
            return Err(Error::schema(format!(
                "entry '{identifier}': fields {field_names:?} do not match table columns {column_names:?}"
            )));
        }

        Ok(Self {
            identifier,
            metadata: Arc::new(metadata),
            fields,
            table,
        })
    }

    /// Validate a loader record and turn it into an entry.
    pub fn from_record(record: RawRecord) -> Result<Self> {
        let RawRecord {
            identifier,
            metadata,
            fields,
            columns,
        } = record;

        if fields.len() != columns.len() {
            return Err(Error::schema(format!(
                "entry '{identifier}': {} fields but {} columns",
                fields.len(),
                columns.len()
            )));
        }

        let metadata = Metadata::from_value(metadata)
            .map_err(|e| Error::schema(format!("entry '{identifier}': {e}")))?;

        let mut descriptors = Vec::with_capacity(fields.len());
        let mut named_columns = Vec::with_capacity(columns.len());
        for (field, values) in fields.into_iter().zip(columns) {
            let original_unit = match field.original_unit {
                Some(unit) => unit,
                None => {
                    warn!(
                        "entry '{identifier}': field '{}' has no original unit, assuming '{}'",
                        field.name, field.unit
                    );
                    field.unit.clone()
                }
            };
            let descriptor = FieldDescriptor::new(field.name.clone(), field.unit, original_unit)
                .map_err(|e| Error::schema(format!("entry '{identifier}': {e}")))?
                .with_attributes(field.attributes);
            descriptors.push(descriptor);
            named_columns.push((field.name, values));
        }

        let table = Table::new(named_columns)
            .map_err(|e| Error::schema(format!("entry '{identifier}': {e}")))?;

        Self::new(identifier, metadata, descriptors, table)
    }

    // -- Accessors --

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn system(&self) -> &System {
        self.metadata.system()
    }

    pub fn source(&self) -> &Source {
        self.metadata.source()
    }

    /// Top-level metadata key, see [`Metadata::get`].
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    /// Key of the entry's publication in the bibliography.
    pub fn citation_key(&self) -> &str {
        self.metadata.source().citation_key()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.field_index(name).map(|i| &self.fields[i])
    }

    /// Current unit of the field `name`.
    pub fn field_unit(&self, name: &str) -> Result<&str> {
        self.field(name).map(FieldDescriptor::unit)
    }

    pub fn column(&self, name: &str) -> Result<&[f64]> {
        let index = self.field_index(name)?;
        Ok(self.table.column_at(index).unwrap_or_default())
    }

    /// Name of the field to use for `name`. Entries digitized from plots of
    /// a current rather than a current density carry `I` instead of `j`.
    pub fn resolve_field<'a>(&'a self, name: &'a str) -> Result<&'a str> {
        if self.table.position(name).is_some() {
            return Ok(name);
        }
        if name == "j" {
            return self.resolve_field("I");
        }
        Err(self.unknown_field(name))
    }

    /// The electrode labelled `name`, or whose function is `name`.
    pub fn get_electrode(&self, name: &str) -> Result<&Electrode> {
        self.metadata
            .system()
            .electrode(name)
            .ok_or_else(|| Error::ElectrodeNotFound {
                identifier: self.identifier.clone(),
                name: name.to_string(),
            })
    }

    // -- Rescaling --

    /// Return a copy of this entry with fields converted to other units.
    ///
    /// ```
    /// # use echemdb::{Entry, UnitSpec};
    /// # fn demo(entry: &Entry) -> echemdb::Result<()> {
    /// let in_millivolts = entry.rescale([("E", "mV")])?;
    /// let as_published = in_millivolts.rescale(UnitSpec::Original)?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// Fields already in their target unit keep their values untouched.
    pub fn rescale(&self, spec: impl Into<UnitSpec>) -> Result<Entry> {
        let targets: Vec<(usize, String)> = match spec.into() {
            UnitSpec::Original => self
                .fields
                .iter()
                .enumerate()
                .map(|(i, field)| (i, field.original_unit().to_string()))
                .collect(),
            UnitSpec::Units(units) => units
                .into_iter()
                .map(|(name, unit)| Ok((self.field_index(&name)?, unit)))
                .collect::<Result<_>>()?,
        };

        let mut fields = self.fields.clone();
        let mut table = self.table.clone();

        for (index, target) in targets {
            let field = &self.fields[index];
            if field.unit() == target {
                continue;
            }

            let factor = UnitRegistry::conversion_factor(field.unit(), &target)?;
            trace!(
                "{}: rescaling '{}' from '{}' to '{}' (x{factor})",
                self.identifier,
                field.name(),
                field.unit(),
                target
            );

            let values = table
                .column_at(index)
                .unwrap_or_default()
                .iter()
                .map(|v| v * factor)
                .collect();
            table = table.with_column(index, values);
            fields[index] = field.with_unit(&target);
        }

        Ok(Entry {
            identifier: self.identifier.clone(),
            metadata: Arc::clone(&self.metadata),
            fields,
            table,
        })
    }

    fn field_index(&self, name: &str) -> Result<usize> {
        self.table
            .position(name)
            .ok_or_else(|| self.unknown_field(name))
    }

    fn unknown_field(&self, name: &str) -> Error {
        Error::UnknownField {
            identifier: self.identifier.clone(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entry('{}')", self.identifier)
    }
}
