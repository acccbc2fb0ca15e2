use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::units::UnitRegistry;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// MetadataValue – a single node of an entry's metadata tree
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value mirroring the JSON found in
/// datapackage descriptors. Facet filters keep these in `BTreeSet`s so
/// `MetadataValue` must be `Ord`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date string kept as text for simplicity.
    Date(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
    Null,
}

// -- Manual Eq/Ord so we can put MetadataValue in BTreeSet --

// Floats compare by `total_cmp` so equality, ordering and hashing agree.
impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn discriminant(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                Date(_) => 5,
                List(_) => 6,
                Map(_) => 7,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) | (Date(a), Date(b)) => a.cmp(b),
            (List(a), List(b)) => a.cmp(b),
            (Map(a), Map(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for MetadataValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => s.hash(state),
            MetadataValue::Integer(i) => i.hash(state),
            MetadataValue::Float(f) => f.to_bits().hash(state),
            MetadataValue::Bool(b) => b.hash(state),
            MetadataValue::List(items) => items.hash(state),
            MetadataValue::Map(map) => map.hash(state),
            MetadataValue::Null => {}
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.4}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Date(d) => write!(f, "{d}"),
            MetadataValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            MetadataValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl From<&JsonValue> for MetadataValue {
    fn from(val: &JsonValue) -> Self {
        match val {
            JsonValue::String(s) if looks_like_date(s) => MetadataValue::Date(s.clone()),
            JsonValue::String(s) => MetadataValue::String(s.clone()),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    MetadataValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    MetadataValue::Float(f)
                } else {
                    MetadataValue::String(n.to_string())
                }
            }
            JsonValue::Bool(b) => MetadataValue::Bool(*b),
            JsonValue::Null => MetadataValue::Null,
            JsonValue::Array(items) => {
                MetadataValue::List(items.iter().map(MetadataValue::from).collect())
            }
            JsonValue::Object(obj) => MetadataValue::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), MetadataValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

/// `YYYY-MM-DD`, as written by the curation tooling.
fn looks_like_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Metadata keys are written both as `citation key` and `citation_key`.
fn same_key(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.chars()
            .zip(b.chars())
            .all(|(x, y)| x == y || (matches!(x, ' ' | '_') && matches!(y, ' ' | '_')))
}

/// Look up `key` in a metadata mapping, treating spaces and underscores
/// as equivalent.
pub(crate) fn lookup<'a>(
    map: &'a BTreeMap<String, MetadataValue>,
    key: &str,
) -> Option<&'a MetadataValue> {
    map.get(key)
        .or_else(|| map.iter().find(|(k, _)| same_key(k, key)).map(|(_, v)| v))
}

impl MetadataValue {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The text of a `String` or `Date` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, MetadataValue>> {
        match self {
            MetadataValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MetadataValue]> {
        match self {
            MetadataValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Child of a mapping by key, or of a list by index or by the `name`
    /// of one of its mapping elements.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        match self {
            MetadataValue::Map(map) => lookup(map, key),
            MetadataValue::List(items) => match key.parse::<usize>() {
                Ok(index) => items.get(index),
                Err(_) => items.iter().find(|item| {
                    item.get("name").and_then(MetadataValue::as_str) == Some(key)
                }),
            },
            _ => None,
        }
    }

    /// Walk a dotted path such as `system.electrodes.WE.material`.
    pub fn get_path(&self, path: &str) -> Option<&MetadataValue> {
        path.split('.')
            .try_fold(self, |node, segment| node.get(segment))
    }
}

// ---------------------------------------------------------------------------
// FieldDescriptor – one column of an entry's table
// ---------------------------------------------------------------------------

/// Name and units of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    name: String,
    unit: String,
    original_unit: String,
    /// Further keys of the field description, e.g. the `reference` electrode
    /// of a potential axis.
    attributes: BTreeMap<String, MetadataValue>,
}

impl FieldDescriptor {
    /// Fails when either unit is unknown or the two units do not share a
    /// dimension.
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        original_unit: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let unit = unit.into();
        let original_unit = original_unit.into();

        let compatible = UnitRegistry::compatible(&unit, &original_unit)
            .map_err(|e| Error::schema(format!("field '{name}': {e}")))?;
        if !compatible {
            return Err(Error::schema(format!(
                "field '{name}': unit '{unit}' is not compatible with original unit '{original_unit}'"
            )));
        }

        Ok(Self {
            name,
            unit,
            original_unit,
            attributes: BTreeMap::new(),
        })
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, MetadataValue>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn original_unit(&self) -> &str {
        &self.original_unit
    }

    pub fn attributes(&self) -> &BTreeMap<String, MetadataValue> {
        &self.attributes
    }

    /// A further key of the field description, e.g. `reference`.
    pub fn attribute(&self, key: &str) -> Option<&MetadataValue> {
        lookup(&self.attributes, key)
    }

    /// Same field expressed in `unit`; the caller has checked compatibility.
    pub(crate) fn with_unit(&self, unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Table – the numeric columns of an entry
// ---------------------------------------------------------------------------

/// Named columns of equal length. Columns are reference counted, so a
/// rescaled entry shares every column it did not convert.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Arc<[f64]>>,
    rows: usize,
}

impl Table {
    /// Build a table from `(name, values)` pairs. Names must be unique and
    /// all columns must have the same length.
    pub fn new(columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let rows = columns.first().map_or(0, |(_, values)| values.len());
        let mut seen = BTreeSet::new();
        let mut names = Vec::with_capacity(columns.len());
        let mut data = Vec::with_capacity(columns.len());

        for (name, values) in columns {
            if !seen.insert(name.clone()) {
                return Err(Error::schema(format!("duplicate column '{name}'")));
            }
            if values.len() != rows {
                return Err(Error::schema(format!(
                    "column '{name}' has {} values but the table has {rows} rows",
                    values.len()
                )));
            }
            names.push(name);
            data.push(Arc::from(values));
        }

        Ok(Self {
            names,
            columns: data,
            rows,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.position(name).map(|i| &*self.columns[i])
    }

    pub fn column_at(&self, index: usize) -> Option<&[f64]> {
        self.columns.get(index).map(|c| &**c)
    }

    /// Values of one row, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        (index < self.rows).then(|| self.columns.iter().map(|c| c[index]).collect())
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        (0..self.rows).map(move |i| self.columns.iter().map(|c| c[i]).collect())
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Copy of this table with column `index` replaced.
    pub(crate) fn with_column(&self, index: usize, values: Vec<f64>) -> Self {
        let mut columns = self.columns.clone();
        columns[index] = Arc::from(values);
        Self {
            names: self.names.clone(),
            columns,
            rows: self.rows,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw records – what a loader hands to the collection
// ---------------------------------------------------------------------------

/// Description of one column as found in a datapackage.
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub name: String,
    pub unit: String,
    /// Unit of the digitized figure; `None` means the current unit.
    pub original_unit: Option<String>,
    pub attributes: BTreeMap<String, MetadataValue>,
}

impl RawField {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            original_unit: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn original_unit(mut self, unit: impl Into<String>) -> Self {
        self.original_unit = Some(unit.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Metadata and field descriptions of a record before its table is bound.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTemplate {
    pub identifier: String,
    pub metadata: MetadataValue,
    pub fields: Vec<RawField>,
}

impl RecordTemplate {
    /// Attach parallel columns, one per field, in field order.
    pub fn bind(self, columns: Vec<Vec<f64>>) -> RawRecord {
        RawRecord {
            identifier: self.identifier,
            metadata: self.metadata,
            fields: self.fields,
            columns,
        }
    }
}

/// One measurement as produced by a loader: identifier, metadata tree and
/// parallel columns described by `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub identifier: String,
    pub metadata: MetadataValue,
    pub fields: Vec<RawField>,
    pub columns: Vec<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_conversion() {
        let value = MetadataValue::from(&json!({
            "name": "WE",
            "date": "2021-07-09",
            "height": {"value": 2, "unit": "mm"},
            "tags": [1, 2.5, true, null],
        }));
        assert_eq!(value.get("name"), Some(&MetadataValue::from("WE")));
        assert_eq!(
            value.get("date"),
            Some(&MetadataValue::Date("2021-07-09".to_string()))
        );
        assert_eq!(value.get_path("height.value").and_then(|v| v.as_f64()), Some(2.0));
        assert_eq!(value.get_path("tags.3"), Some(&MetadataValue::Null));
    }

    #[test]
    fn test_lookup_treats_underscores_as_spaces() {
        let value = MetadataValue::from(&json!({"citation key": "alves_2011"}));
        assert_eq!(
            value.get("citation_key").and_then(MetadataValue::as_str),
            Some("alves_2011")
        );
    }

    #[test]
    fn test_list_lookup_by_name() {
        let value = MetadataValue::from(&json!({
            "electrodes": [{"name": "RE", "material": "Pt"}, {"name": "WE", "material": "Au"}]
        }));
        assert_eq!(
            value.get_path("electrodes.WE.material"),
            Some(&MetadataValue::from("Au"))
        );
        assert_eq!(value.get_path("electrodes.0.name"), Some(&MetadataValue::from("RE")));
        assert_eq!(value.get_path("electrodes.CE"), None);
    }

    #[test]
    fn test_ordering_is_total() {
        let mut set = BTreeSet::new();
        set.insert(MetadataValue::from("Pt"));
        set.insert(MetadataValue::Null);
        set.insert(MetadataValue::Integer(3));
        set.insert(MetadataValue::from("Au"));
        let ordered: Vec<_> = set.iter().map(|v| v.to_string()).collect();
        assert_eq!(ordered, vec!["<null>", "3", "Au", "Pt"]);
    }

    #[test]
    fn test_float_equality_matches_hash() {
        use std::collections::HashSet;

        let nan = MetadataValue::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_ne!(MetadataValue::Float(0.0), MetadataValue::Float(-0.0));

        let mut seen = HashSet::new();
        assert!(seen.insert(nan.clone()));
        assert!(!seen.insert(nan));
        assert!(seen.insert(MetadataValue::Float(0.0)));
        assert!(seen.insert(MetadataValue::Float(-0.0)));
    }

    #[test]
    fn test_field_descriptor_rejects_mixed_dimensions() {
        assert!(FieldDescriptor::new("E", "V", "mV").is_ok());
        assert!(matches!(
            FieldDescriptor::new("E", "V", "mA / cm2"),
            Err(Error::Schema(_))
        ));
        assert!(matches!(
            FieldDescriptor::new("E", "parsec", "V"),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_table_validation() {
        let table = Table::new(vec![
            ("t".to_string(), vec![0.0, 1.0]),
            ("E".to_string(), vec![0.1, 0.2]),
        ])
        .unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.row(1), Some(vec![1.0, 0.2]));
        assert_eq!(table.row(2), None);
        assert_eq!(
            table.rows().collect::<Vec<_>>(),
            vec![vec![0.0, 0.1], vec![1.0, 0.2]]
        );

        assert!(Table::new(vec![
            ("t".to_string(), vec![0.0, 1.0]),
            ("E".to_string(), vec![0.1]),
        ])
        .is_err());
        assert!(Table::new(vec![
            ("t".to_string(), vec![0.0]),
            ("t".to_string(), vec![0.1]),
        ])
        .is_err());
    }

    #[test]
    fn test_with_column_shares_untouched_columns() {
        let table = Table::new(vec![
            ("t".to_string(), vec![0.0, 1.0]),
            ("E".to_string(), vec![0.1, 0.2]),
        ])
        .unwrap();
        let scaled = table.with_column(1, vec![100.0, 200.0]);
        assert_eq!(table.column("E"), Some(&[0.1, 0.2][..]));
        assert_eq!(scaled.column("E"), Some(&[100.0, 200.0][..]));
        assert!(Arc::ptr_eq(&table.columns[0], &scaled.columns[0]));
    }
}
