//! # echemdb
//!
//! Unit-aware access to curated electrochemical measurement records.
//!
//! An [`Entry`] pairs the metadata of one measurement (electrochemical
//! system, electrodes, publication) with a table of signals such as time
//! `t`, potential `E` and current density `j`. Entries are gathered in an
//! [`EntryCollection`] that can be filtered by arbitrary predicates over
//! the metadata, and every entry can be rescaled to other units:
//!
//! ```
//! use echemdb::{EntryCollection, RawField, RawRecord, MetadataValue, UnitSpec};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let record = RawRecord {
//!     identifier: "engstfeld_2018_polycrystalline_17743_f4b_1".to_string(),
//!     metadata: MetadataValue::from(&json!({
//!         "system": {"electrodes": [{"name": "WE", "function": "working electrode", "material": "Cu"}]},
//!         "source": {"citation key": "engstfeld_2018_polycrystalline_17743"},
//!     })),
//!     fields: vec![
//!         RawField::new("E", "V").original_unit("V"),
//!         RawField::new("j", "A / m2").original_unit("mA / cm2"),
//!     ],
//!     columns: vec![vec![-0.1, 0.0, 0.1], vec![1.0, 2.0, 4.0]],
//! };
//!
//! let database = EntryCollection::from_records(vec![record])?;
//! let copper = database.filter_by(|entry| {
//!     entry.get_electrode("working_electrode").ok().and_then(|we| we.material()) == Some("Cu")
//! });
//!
//! let entry = copper.get("engstfeld_2018_polycrystalline_17743_f4b_1")?;
//! let published = entry.rescale(UnitSpec::Original)?;
//! assert_eq!(published.field_unit("j")?, "mA / cm2");
//! assert_eq!(published.column("j")?, &[0.1, 0.2, 0.4]);
//! # Ok(())
//! # }
//! ```
//!
//! Locating and downloading datapackages is left to the caller; the
//! [`loader`](data::loader) turns an already read descriptor and its CSV or
//! Arrow data into a [`RawRecord`].

pub mod config;
pub mod data;
pub mod error;

pub use config::{Config, SchemaVersion};
pub use data::collection::{EntryCollection, Summary};
pub use data::entry::{Entry, UnitSpec};
pub use data::filter::FacetFilter;
pub use data::metadata::{Electrode, Metadata, Source, System};
pub use data::model::{FieldDescriptor, MetadataValue, RawField, RawRecord, RecordTemplate, Table};
pub use data::units::{CompoundUnit, Dimension, UnitRegistry};
pub use error::{Error, FilterEvaluationError, Result};
