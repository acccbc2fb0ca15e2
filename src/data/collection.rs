use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::Serialize;

use super::entry::{Entry, UnitSpec};
use super::filter::{facet_indices, matching_indices, FacetFilter};
use super::model::RawRecord;
use crate::config::Config;
use crate::error::{Error, FilterEvaluationError, Result};

// ---------------------------------------------------------------------------
// Summary – what `describe` reports
// ---------------------------------------------------------------------------

/// Aggregate statistics of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Number of entries.
    pub entries: usize,
    /// Number of distinct publications (citation keys).
    pub references: usize,
    /// Distinct electrode materials.
    pub materials: BTreeSet<String>,
    /// Distinct system types.
    pub systems: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// EntryCollection
// ---------------------------------------------------------------------------

/// An ordered set of entries keyed by identifier.
///
/// Entries are shared (`Arc`) between a collection and the collections
/// derived from it by [`filter`](Self::filter), so narrowing a collection
/// never copies tables.
#[derive(Debug, Clone, Default)]
pub struct EntryCollection {
    entries: Vec<Arc<Entry>>,
    index: BTreeMap<String, usize>,
}

impl EntryCollection {
    /// Build a collection in loader order with the default [`Config`].
    pub fn from_records(records: impl IntoIterator<Item = RawRecord>) -> Result<Self> {
        Self::from_records_with(records, &Config::default())
    }

    /// Build a collection. Any malformed record or duplicate identifier
    /// fails the whole construction.
    pub fn from_records_with(
        records: impl IntoIterator<Item = RawRecord>,
        config: &Config,
    ) -> Result<Self> {
        let entries = records
            .into_iter()
            .map(Entry::from_record)
            .collect::<Result<Vec<_>>>()?;
        Self::from_entries_with(entries, config)
    }

    /// Build a collection from already constructed entries.
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Result<Self> {
        Self::from_entries_with(entries, &Config::default())
    }

    fn from_entries_with(
        entries: impl IntoIterator<Item = Entry>,
        config: &Config,
    ) -> Result<Self> {
        let mut entries: Vec<Arc<Entry>> = entries.into_iter().map(Arc::new).collect();
        if config.sort_by_identifier {
            entries.sort_by(|a, b| a.identifier().cmp(b.identifier()));
        }

        let mut index = BTreeMap::new();
        for (i, entry) in entries.iter().enumerate() {
            if index.insert(entry.identifier().to_string(), i).is_some() {
                return Err(Error::schema(format!(
                    "the database has more than one entry with identifier '{}'",
                    entry.identifier()
                )));
            }
        }

        debug!("Built collection of {} entries", entries.len());
        Ok(Self { entries, index })
    }

    /// Sub-collection of the entries at `indices`, which are increasing.
    fn select(&self, indices: &[usize]) -> Self {
        let entries: Vec<Arc<Entry>> = indices
            .iter()
            .map(|&i| Arc::clone(&self.entries[i]))
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.identifier().to_string(), i))
            .collect();
        Self { entries, index }
    }

    // -- Lookup --

    /// The entry with this identifier.
    pub fn get(&self, identifier: &str) -> Result<&Arc<Entry>> {
        self.index
            .get(identifier)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| Error::EntryNotFound(identifier.to_string()))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Entry>> {
        self.entries.iter()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.identifier())
    }

    // -- Filtering --

    /// The entries for which `predicate` returns `Ok(true)`, in the same
    /// relative order. A predicate error aborts the whole filter and names
    /// the offending entry.
    ///
    /// ```
    /// # use echemdb::EntryCollection;
    /// # fn demo(database: &EntryCollection) -> anyhow::Result<()> {
    /// let platinum = database.filter(|entry| {
    ///     Ok::<_, echemdb::Error>(entry.get_electrode("WE")?.material() == Some("Pt"))
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn filter<F, E>(&self, predicate: F) -> std::result::Result<Self, FilterEvaluationError>
    where
        F: FnMut(&Entry) -> std::result::Result<bool, E>,
        E: Into<anyhow::Error>,
    {
        let indices = matching_indices(self, predicate)?;
        debug!("Filter kept {} of {} entries", indices.len(), self.len());
        Ok(self.select(&indices))
    }

    /// Same as [`filter`](Self::filter) for predicates that cannot fail.
    pub fn filter_by<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&Entry) -> bool,
    {
        let indices: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| predicate(Arc::as_ref(entry)))
            .map(|(i, _)| i)
            .collect();
        debug!("Filter kept {} of {} entries", indices.len(), self.len());
        self.select(&indices)
    }

    /// The entries passing every facet of `facets`.
    pub fn filter_facets(&self, facets: &FacetFilter) -> Self {
        self.select(&facet_indices(self, facets))
    }

    // -- Derived views --

    /// Rescale every entry, see [`Entry::rescale`].
    pub fn rescale(&self, spec: impl Into<UnitSpec>) -> Result<Self> {
        let spec = spec.into();
        let entries = self
            .entries
            .iter()
            .map(|entry| entry.rescale(spec.clone()).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            entries,
            index: self.index.clone(),
        })
    }

    /// Distinct materials of all electrodes of all entries.
    pub fn materials(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .flat_map(|entry| entry.system().electrodes())
            .filter_map(|electrode| electrode.material())
            .map(str::to_string)
            .collect()
    }

    /// Distinct citation keys.
    pub fn bibliography_keys(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .map(|entry| entry.citation_key().to_string())
            .collect()
    }

    /// Distinct system types.
    pub fn systems(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter_map(|entry| entry.system().kind())
            .map(str::to_string)
            .collect()
    }

    pub fn describe(&self) -> Summary {
        Summary {
            entries: self.len(),
            references: self.bibliography_keys().len(),
            materials: self.materials(),
            systems: self.systems(),
        }
    }
}

impl<'a> IntoIterator for &'a EntryCollection {
    type Item = &'a Arc<Entry>;
    type IntoIter = std::slice::Iter<'a, Arc<Entry>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for EntryCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{entry}")?;
        }
        write!(f, "]")
    }
}
