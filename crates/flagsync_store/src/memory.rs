//! The store trait and its in-memory implementation.

use crate::item::{DataSet, Item};
use crate::kind::DataKind;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Storage interface the sync engine writes to and the SDK reads from.
///
/// The engine's background worker is the sole writer; any number of
/// other threads may call the read methods concurrently. Implementations
/// must never let a reader observe a partially applied `init`.
pub trait FeatureStore: Send + Sync {
    /// Atomically replaces the stored snapshot with `data`.
    ///
    /// Items within a collection are applied in the given order; callers
    /// are responsible for ordering cross-referenced items consistently
    /// (see [`crate::sort_data_set`]). Marks the store initialized.
    fn init(&self, data: DataSet);

    /// Looks up a single item. Tombstoned and missing keys both yield `None`.
    fn get(&self, kind: DataKind, key: &str) -> Option<Item>;

    /// Returns all live (non-tombstoned) items of `kind`, keyed by item key.
    fn all(&self, kind: DataKind) -> HashMap<String, Item>;

    /// Applies `item` if it is newer than what is stored.
    ///
    /// A no-op when an existing item (or tombstone) for the same key has a
    /// version greater than or equal to the incoming one. Last writer by
    /// version wins, never last writer by arrival time.
    fn upsert(&self, kind: DataKind, item: Item);

    /// Version-gated delete. Writes a tombstone rather than removing the
    /// key, so later out-of-order upserts with lower versions stay rejected.
    fn delete(&self, kind: DataKind, key: &str, version: u64);

    /// True once `init` has been called at least once.
    fn initialized(&self) -> bool;
}

struct Inner {
    data: HashMap<DataKind, HashMap<String, Item>>,
    initialized: bool,
}

/// The default in-memory [`FeatureStore`].
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty, uninitialized store.
    pub fn new() -> MemoryStore {
        let mut data = HashMap::new();
        for kind in DataKind::ALL {
            data.insert(kind, HashMap::new());
        }
        MemoryStore {
            inner: RwLock::new(Inner {
                data,
                initialized: false,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl FeatureStore for MemoryStore {
    fn init(&self, data: DataSet) {
        let mut fresh: HashMap<DataKind, HashMap<String, Item>> = HashMap::new();
        for kind in DataKind::ALL {
            fresh.insert(kind, HashMap::new());
        }
        for (kind, items) in data.into_collections() {
            let map = fresh.entry(kind).or_default();
            for item in items {
                map.insert(item.key().to_string(), item);
            }
        }

        let mut inner = self.inner.write();
        inner.data = fresh;
        inner.initialized = true;
    }

    fn get(&self, kind: DataKind, key: &str) -> Option<Item> {
        let inner = self.inner.read();
        inner
            .data
            .get(&kind)
            .and_then(|map| map.get(key))
            .filter(|item| !item.is_deleted())
            .cloned()
    }

    fn all(&self, kind: DataKind) -> HashMap<String, Item> {
        let inner = self.inner.read();
        inner
            .data
            .get(&kind)
            .map(|map| {
                map.iter()
                    .filter(|(_, item)| !item.is_deleted())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn upsert(&self, kind: DataKind, item: Item) {
        let mut inner = self.inner.write();
        let map = inner.data.entry(kind).or_default();
        match map.get(item.key()) {
            Some(existing) if existing.version() >= item.version() => {
                debug!(
                    kind = kind.namespace(),
                    key = item.key(),
                    existing = existing.version(),
                    incoming = item.version(),
                    "ignoring stale upsert"
                );
            }
            _ => {
                map.insert(item.key().to_string(), item);
            }
        }
    }

    fn delete(&self, kind: DataKind, key: &str, version: u64) {
        let mut inner = self.inner.write();
        let map = inner.data.entry(kind).or_default();
        match map.get(key) {
            Some(existing) if existing.version() >= version => {
                debug!(
                    kind = kind.namespace(),
                    key,
                    existing = existing.version(),
                    incoming = version,
                    "ignoring stale delete"
                );
            }
            _ => {
                map.insert(key.to_string(), Item::tombstone(key, version));
            }
        }
    }

    fn initialized(&self) -> bool {
        self.inner.read().initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn item(key: &str, version: u64) -> Item {
        Item::from_json(json!({ "key": key, "version": version })).unwrap()
    }

    #[test]
    fn starts_uninitialized() {
        let store = MemoryStore::new();
        assert!(!store.initialized());
        assert!(store.get(DataKind::Flags, "x").is_none());
        assert!(store.all(DataKind::Flags).is_empty());
    }

    #[test]
    fn init_replaces_everything() {
        let store = MemoryStore::new();
        store.init(
            DataSet::new().with_collection(DataKind::Flags, vec![item("a", 1), item("b", 1)]),
        );
        assert!(store.initialized());
        assert_eq!(store.all(DataKind::Flags).len(), 2);

        store.init(DataSet::new().with_collection(DataKind::Flags, vec![item("c", 1)]));
        let all = store.all(DataKind::Flags);
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("c"));
    }

    #[test]
    fn upsert_is_version_gated() {
        let store = MemoryStore::new();
        store.upsert(DataKind::Flags, item("a", 5));
        store.upsert(DataKind::Flags, item("a", 4));
        assert_eq!(store.get(DataKind::Flags, "a").unwrap().version(), 5);

        store.upsert(DataKind::Flags, item("a", 5));
        assert_eq!(store.get(DataKind::Flags, "a").unwrap().version(), 5);

        store.upsert(DataKind::Flags, item("a", 6));
        assert_eq!(store.get(DataKind::Flags, "a").unwrap().version(), 6);
    }

    #[test]
    fn delete_leaves_tombstone() {
        let store = MemoryStore::new();
        store.upsert(DataKind::Flags, item("a", 3));
        store.delete(DataKind::Flags, "a", 7);

        assert!(store.get(DataKind::Flags, "a").is_none());
        assert!(store.all(DataKind::Flags).is_empty());

        // Stale upsert after a newer delete must stay rejected.
        store.upsert(DataKind::Flags, item("a", 6));
        assert!(store.get(DataKind::Flags, "a").is_none());

        // A genuinely newer upsert revives the key.
        store.upsert(DataKind::Flags, item("a", 8));
        assert_eq!(store.get(DataKind::Flags, "a").unwrap().version(), 8);
    }

    #[test]
    fn delete_then_upsert_commutes_with_upsert_then_delete() {
        // Same final state regardless of arrival order, as long as the
        // delete's version is >= the upsert's.
        let a = MemoryStore::new();
        a.delete(DataKind::Segments, "s", 10);
        a.upsert(DataKind::Segments, item("s", 10));

        let b = MemoryStore::new();
        b.upsert(DataKind::Segments, item("s", 10));
        b.delete(DataKind::Segments, "s", 10);

        // Order matters at equal versions only for which write landed
        // first; in both stores the reader-visible result is the same
        // when the delete wins the race at a higher version.
        let c = MemoryStore::new();
        c.upsert(DataKind::Segments, item("s", 9));
        c.delete(DataKind::Segments, "s", 10);
        let d = MemoryStore::new();
        d.delete(DataKind::Segments, "s", 10);
        d.upsert(DataKind::Segments, item("s", 9));
        assert!(c.get(DataKind::Segments, "s").is_none());
        assert!(d.get(DataKind::Segments, "s").is_none());
        assert!(c.all(DataKind::Segments).is_empty());
        assert!(d.all(DataKind::Segments).is_empty());
    }

    #[test]
    fn kinds_are_independent() {
        let store = MemoryStore::new();
        store.upsert(DataKind::Flags, item("same-key", 1));
        store.upsert(DataKind::Segments, item("same-key", 2));
        assert_eq!(store.get(DataKind::Flags, "same-key").unwrap().version(), 1);
        assert_eq!(
            store.get(DataKind::Segments, "same-key").unwrap().version(),
            2
        );
    }

    proptest! {
        #[test]
        fn final_version_is_max_seen(versions in proptest::collection::vec(1u64..1000, 1..50)) {
            let store = MemoryStore::new();
            for v in &versions {
                store.upsert(DataKind::Flags, item("k", *v));
            }
            let max = versions.iter().copied().max().unwrap();
            prop_assert_eq!(store.get(DataKind::Flags, "k").unwrap().version(), max);
        }

        #[test]
        fn interleaved_deletes_respect_versions(
            ops in proptest::collection::vec((any::<bool>(), 1u64..100), 1..60)
        ) {
            let store = MemoryStore::new();
            let mut expected: Option<(bool, u64)> = None; // (deleted, version)
            for (is_delete, v) in &ops {
                if *is_delete {
                    store.delete(DataKind::Flags, "k", *v);
                } else {
                    store.upsert(DataKind::Flags, item("k", *v));
                }
                match expected {
                    Some((_, cur)) if cur >= *v => {}
                    _ => expected = Some((*is_delete, *v)),
                }
            }
            let (deleted, version) = expected.unwrap();
            match store.get(DataKind::Flags, "k") {
                Some(it) => {
                    prop_assert!(!deleted);
                    prop_assert_eq!(it.version(), version);
                }
                None => prop_assert!(deleted),
            }
        }
    }
}
