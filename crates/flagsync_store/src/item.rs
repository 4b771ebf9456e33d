//! The versioned item model and full data sets.

use crate::kind::DataKind;
use serde_json::{json, Value};
use thiserror::Error;

/// Errors raised while extracting an item from a wire payload.
#[derive(Error, Debug)]
pub enum ItemError {
    /// The payload was not a JSON object.
    #[error("item payload is not a JSON object")]
    NotAnObject,
    /// The payload had no usable `key` field.
    #[error("item payload is missing a string `key`")]
    MissingKey,
    /// The payload had no usable `version` field.
    #[error("item payload is missing an integer `version`")]
    MissingVersion,
}

/// A single versioned item (one flag or segment definition).
///
/// `key` and `version` are extracted for store bookkeeping; everything
/// else is opaque payload carried through unmodified in `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    key: String,
    version: u64,
    deleted: bool,
    fields: Value,
}

impl Item {
    /// Extracts an item from a wire JSON object.
    ///
    /// The object must carry a string `key` and an integer `version`.
    pub fn from_json(value: Value) -> Result<Item, ItemError> {
        let obj = value.as_object().ok_or(ItemError::NotAnObject)?;
        let key = obj
            .get("key")
            .and_then(Value::as_str)
            .ok_or(ItemError::MissingKey)?
            .to_string();
        let version = obj
            .get("version")
            .and_then(Value::as_u64)
            .ok_or(ItemError::MissingVersion)?;
        let deleted = obj.get("deleted").and_then(Value::as_bool).unwrap_or(false);
        Ok(Item {
            key,
            version,
            deleted,
            fields: value,
        })
    }

    /// Extracts an item, first writing `key` into the object.
    ///
    /// Used where the collection map key is authoritative and wire items
    /// may not carry their own `key` field.
    pub fn from_json_with_key(key: &str, mut value: Value) -> Result<Item, ItemError> {
        match value.as_object_mut() {
            Some(obj) => {
                obj.insert("key".into(), Value::String(key.to_string()));
            }
            None => return Err(ItemError::NotAnObject),
        }
        Item::from_json(value)
    }

    /// Creates a tombstone: a placeholder recording that `key` was deleted
    /// at `version`, so stale upserts keep losing the version race.
    pub fn tombstone(key: impl Into<String>, version: u64) -> Item {
        let key = key.into();
        let fields = json!({ "key": key, "version": version, "deleted": true });
        Item {
            key,
            version,
            deleted: true,
            fields,
        }
    }

    /// The unique key within the item's collection.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The item's version. Higher wins.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// True for tombstones.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// The full wire payload, including `key` and `version`.
    pub fn fields(&self) -> &Value {
        &self.fields
    }

    /// Looks up a single payload field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A full snapshot of one or more collections, ordered for `init`.
///
/// The order of collections and of items within a collection is
/// significant: the store applies them as given, so callers order
/// referenced items first (see [`crate::sort_data_set`]).
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    collections: Vec<(DataKind, Vec<Item>)>,
}

impl DataSet {
    /// Creates an empty data set.
    pub fn new() -> DataSet {
        DataSet::default()
    }

    /// Adds a full collection.
    pub fn with_collection(mut self, kind: DataKind, items: Vec<Item>) -> DataSet {
        self.collections.push((kind, items));
        self
    }

    /// The collections in application order.
    pub fn collections(&self) -> &[(DataKind, Vec<Item>)] {
        &self.collections
    }

    /// Consumes the set, yielding collections in application order.
    pub fn into_collections(self) -> Vec<(DataKind, Vec<Item>)> {
        self.collections
    }

    /// Number of items held for `kind`.
    pub fn count(&self, kind: DataKind) -> usize {
        self.collections
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, items)| items.len())
            .sum()
    }

    /// True when no collections are present.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
