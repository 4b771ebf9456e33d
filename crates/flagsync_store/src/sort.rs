//! Dependency ordering of full data sets.
//!
//! `init` applies items in the order given; flags can reference other
//! flags (prerequisites) and segments, so a full data set is reordered
//! before it reaches the store: segments before flags, and within the
//! flag collection, prerequisites before the flags that name them.

use crate::item::{DataSet, Item};
use crate::kind::DataKind;
use std::collections::HashMap;

/// Reorders a full data set for `init`.
///
/// Collections are sorted by [`DataKind::init_priority`]. For kinds
/// ordered by dependencies, items are topologically sorted so that an
/// item's prerequisites appear before it; reference cycles are broken
/// at the point of revisit rather than rejected.
pub fn sort_data_set(data: DataSet) -> DataSet {
    let mut collections = data.into_collections();
    collections.sort_by_key(|(kind, _)| kind.init_priority());

    let mut out = DataSet::new();
    for (kind, items) in collections {
        let items = if kind.ordered_by_dependencies() {
            sort_by_dependencies(items)
        } else {
            items
        };
        out = out.with_collection(kind, items);
    }
    out
}

fn dependency_keys(item: &Item) -> Vec<String> {
    item.field("prerequisites")
        .and_then(|v| v.as_array())
        .map(|prereqs| {
            prereqs
                .iter()
                .filter_map(|p| p.get("key").and_then(|k| k.as_str()))
                .map(|k| k.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn sort_by_dependencies(items: Vec<Item>) -> Vec<Item> {
    let mut remaining: HashMap<String, Item> = items
        .into_iter()
        .map(|item| (item.key().to_string(), item))
        .collect();
    let mut keys: Vec<String> = remaining.keys().cloned().collect();
    keys.sort(); // deterministic output independent of map order

    let mut ordered = Vec::with_capacity(remaining.len());
    for key in keys {
        visit(&key, &mut remaining, &mut ordered);
    }
    ordered
}

fn visit(key: &str, remaining: &mut HashMap<String, Item>, out: &mut Vec<Item>) {
    // Already emitted, or a dependency on something outside the set.
    let Some(item) = remaining.remove(key) else {
        return;
    };
    for dep in dependency_keys(&item) {
        visit(&dep, remaining, out);
    }
    out.push(item);
}
