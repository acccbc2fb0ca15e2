/// Data layer: entries, units, loading, and filtering.
///
/// Architecture:
/// ```text
///  datapackage descriptor + CSV / Arrow table
///        │
///        ▼
///   ┌──────────────────┐
///   │ schema / loader  │  descriptor → RecordTemplate, table → RawRecord
///   └──────────────────┘
///        │
///        ▼
///   ┌──────────────────┐
///   │ EntryCollection  │  Vec<Arc<Entry>>, identifier index
///   └──────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  predicates / facets → new collection
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  entry    │  rescale through units → new Entry
///   └──────────┘
/// ```

pub mod collection;
pub mod entry;
pub mod filter;
pub mod loader;
pub mod metadata;
pub mod model;
pub mod schema;
pub mod units;
