use std::collections::{BTreeMap, BTreeSet};

use super::collection::EntryCollection;
use super::entry::Entry;
use super::model::MetadataValue;
use crate::error::FilterEvaluationError;

// ---------------------------------------------------------------------------
// Predicate filtering
// ---------------------------------------------------------------------------

/// Return indices of entries for which `predicate` holds, in iteration
/// order. The first predicate error aborts the scan; no entry is dropped
/// silently.
pub fn matching_indices<F, E>(
    collection: &EntryCollection,
    mut predicate: F,
) -> Result<Vec<usize>, FilterEvaluationError>
where
    F: FnMut(&Entry) -> Result<bool, E>,
    E: Into<anyhow::Error>,
{
    let mut matches = Vec::new();
    for (i, entry) in collection.iter().enumerate() {
        match predicate(&**entry) {
            Ok(true) => matches.push(i),
            Ok(false) => {}
            Err(e) => return Err(FilterEvaluationError::new(entry.identifier(), e.into())),
        }
    }
    Ok(matches)
}

// ---------------------------------------------------------------------------
// Facet filtering: which metadata values are selected per path
// ---------------------------------------------------------------------------

/// Per-path selection state: maps a metadata path (as understood by
/// [`Metadata::get_path`](super::metadata::Metadata::get_path)) to the set
/// of selected values.
pub type FacetFilter = BTreeMap<String, BTreeSet<MetadataValue>>;

/// Sorted set of values observed at `path` across the collection. Entries
/// without the path contribute [`MetadataValue::Null`].
pub fn facet_values(collection: &EntryCollection, path: &str) -> BTreeSet<MetadataValue> {
    collection
        .iter()
        .map(|entry| {
            entry
                .metadata()
                .get_path(path)
                .cloned()
                .unwrap_or(MetadataValue::Null)
        })
        .collect()
}

/// Initialise a [`FacetFilter`] over `paths` with all values selected
/// (i.e., keep everything).
pub fn init_facets<'a>(
    collection: &EntryCollection,
    paths: impl IntoIterator<Item = &'a str>,
) -> FacetFilter {
    paths
        .into_iter()
        .map(|path| (path.to_string(), facet_values(collection, path)))
        .collect()
}

/// Return indices of entries that pass all facets.
///
/// An entry passes a facet when:
/// * The selection for that path is empty → nothing selected → fails
/// * The entry's value at that path is in the selected set → passes
/// * The entry has no value at that path → passes only if `Null` is selected
pub fn facet_indices(collection: &EntryCollection, facets: &FacetFilter) -> Vec<usize> {
    collection
        .iter()
        .enumerate()
        .filter(|(_, entry)| {
            facets.iter().all(|(path, selected)| {
                if selected.is_empty() {
                    return false;
                }
                match entry.metadata().get_path(path) {
                    Some(val) => selected.contains(val),
                    None => selected.contains(&MetadataValue::Null),
                }
            })
        })
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{RawField, RawRecord};
    use serde_json::json;

    fn record(identifier: &str, material: &str, curve: Option<&str>) -> RawRecord {
        let mut source = json!({"citation key": identifier});
        if let Some(curve) = curve {
            source["curve"] = json!(curve);
        }
        RawRecord {
            identifier: identifier.to_string(),
            metadata: MetadataValue::from(&json!({
                "system": {"electrodes": [{"name": "WE", "material": material}]},
                "source": source,
            })),
            fields: vec![RawField::new("E", "V")],
            columns: vec![vec![0.0]],
        }
    }

    fn collection() -> EntryCollection {
        EntryCollection::from_records(vec![
            record("a", "Pt", Some("solid")),
            record("b", "Au", None),
            record("c", "Pt", Some("dashed")),
        ])
        .unwrap()
    }

    #[test]
    fn test_matching_indices_in_order() {
        let indices = matching_indices(&collection(), |entry| {
            Ok::<_, anyhow::Error>(entry.get_electrode("WE")?.material() == Some("Pt"))
        })
        .unwrap();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_predicate_error_names_entry() {
        let err = matching_indices(&collection(), |entry| {
            entry.get_electrode("CE").map(|_| true)
        })
        .unwrap_err();
        assert_eq!(err.identifier(), "a");
        assert!(err.to_string().contains("CE"));
    }

    #[test]
    fn test_init_facets_keeps_everything() {
        let c = collection();
        let facets = init_facets(&c, ["system.electrodes.WE.material", "source.curve"]);
        assert_eq!(facets["source.curve"].len(), 3);
        assert_eq!(facet_indices(&c, &facets), vec![0, 1, 2]);
    }

    #[test]
    fn test_facet_selection() {
        let c = collection();
        let mut facets = init_facets(&c, ["system.electrodes.WE.material"]);
        facets
            .get_mut("system.electrodes.WE.material")
            .unwrap()
            .remove(&MetadataValue::from("Au"));
        assert_eq!(facet_indices(&c, &facets), vec![0, 2]);

        facets.insert("source.curve".to_string(), BTreeSet::from([MetadataValue::Null]));
        assert!(facet_indices(&c, &facets).is_empty());

        facets.insert("source.curve".to_string(), BTreeSet::new());
        assert!(facet_indices(&c, &facets).is_empty());
    }

    #[test]
    fn test_missing_path_matches_null() {
        let c = collection();
        let facets = FacetFilter::from([(
            "source.curve".to_string(),
            BTreeSet::from([MetadataValue::Null]),
        )]);
        assert_eq!(facet_indices(&c, &facets), vec![1]);
    }
}
