//! Protocol dialects.
//!
//! The stream speaks one of two variants: the multi-collection "full"
//! sync used by server-side environments, and the single-collection
//! "targeted" sync scoped to one evaluation context. Both converge to
//! the same store semantics; everything variant-specific (envelope
//! shape, path table, supported event set) lives here so the update
//! processor stays a single state machine.

use crate::error::{ProtocolError, ProtocolResult};
use crate::payload::{DeletePayload, KeyedDelete, PatchPayload, PutEnvelope};
use flagsync_store::{DataKind, DataSet, Item};
use serde_json::{Map, Value};

/// Which wire variant the stream speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Multi-collection sync: flags and segments, path-addressed patches,
    /// indirect messages resolved by a follow-up fetch.
    Full,
    /// Single-collection sync: flags only, key-addressed patches, `ping`
    /// as the full-refresh trigger. No indirect messages.
    Targeted,
}

/// A resolved patch: which collection, and the item to upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchTarget {
    /// Collection the item belongs to.
    pub kind: DataKind,
    /// The item to apply, version-gated by the store.
    pub item: Item,
}

impl Dialect {
    /// Dialect name for error and log output.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Full => "full",
            Dialect::Targeted => "targeted",
        }
    }

    /// Stream endpoint path relative to the stream base URI. The targeted
    /// variant appends the encoded context after this path.
    pub fn stream_path(&self) -> &'static str {
        match self {
            Dialect::Full => "/all",
            Dialect::Targeted => "/meval",
        }
    }

    /// Event tags that carry meaning in this dialect.
    pub fn supported_events(&self) -> &'static [&'static str] {
        match self {
            Dialect::Full => &["put", "patch", "delete", "indirect/put", "indirect/patch"],
            Dialect::Targeted => &["put", "patch", "delete", "ping"],
        }
    }

    /// Whether `event` is meaningful in this dialect.
    pub fn supports_event(&self, event: &str) -> bool {
        self.supported_events().contains(&event)
    }

    /// Decodes a streamed `put` payload into a full data set.
    pub fn decode_put(&self, data: &str) -> ProtocolResult<DataSet> {
        match self {
            Dialect::Full => {
                let envelope: PutEnvelope = serde_json::from_str(data)?;
                collections_to_data_set(envelope.data.flags, envelope.data.segments)
            }
            Dialect::Targeted => {
                let flags: Map<String, Value> = serde_json::from_str(data)?;
                flat_flags_to_data_set(flags)
            }
        }
    }

    /// Decodes a polled full-fetch body into a data set.
    ///
    /// The full variant's poll endpoint returns the collections without
    /// the `data` envelope; the targeted variant returns the same flat
    /// key→item map as its `put` event.
    pub fn decode_poll_all(&self, body: &Value) -> ProtocolResult<DataSet> {
        match self {
            Dialect::Full => {
                let collections: crate::payload::AllCollections =
                    serde_json::from_value(body.clone())?;
                collections_to_data_set(collections.flags, collections.segments)
            }
            Dialect::Targeted => {
                let flags: Map<String, Value> = serde_json::from_value(body.clone())?;
                flat_flags_to_data_set(flags)
            }
        }
    }

    /// Decodes a `patch` payload into its target collection and item.
    pub fn decode_patch(&self, data: &str) -> ProtocolResult<PatchTarget> {
        match self {
            Dialect::Full => {
                let payload: PatchPayload = serde_json::from_str(data)?;
                let (kind, key) = self.resolve_path(&payload.path)?;
                let item = Item::from_json_with_key(&key, payload.data)?;
                Ok(PatchTarget { kind, item })
            }
            Dialect::Targeted => {
                let value: Value = serde_json::from_str(data)?;
                let item = Item::from_json(value)?;
                Ok(PatchTarget {
                    kind: DataKind::Flags,
                    item,
                })
            }
        }
    }

    /// Decodes a `delete` payload into `(kind, key, version)`.
    pub fn decode_delete(&self, data: &str) -> ProtocolResult<(DataKind, String, u64)> {
        match self {
            Dialect::Full => {
                let payload: DeletePayload = serde_json::from_str(data)?;
                let (kind, key) = self.resolve_path(&payload.path)?;
                Ok((kind, key, payload.version))
            }
            Dialect::Targeted => {
                let payload: KeyedDelete = serde_json::from_str(data)?;
                Ok((DataKind::Flags, payload.key, payload.version))
            }
        }
    }

    /// Resolves a collection-prefixed path into `(kind, key)`.
    ///
    /// Only the full dialect addresses items by path.
    pub fn resolve_path(&self, path: &str) -> ProtocolResult<(DataKind, String)> {
        match self {
            Dialect::Full => DataKind::parse_stream_path(path)
                .map(|(kind, key)| (kind, key.to_string()))
                .ok_or_else(|| ProtocolError::UnknownPath(path.to_string())),
            Dialect::Targeted => Err(ProtocolError::UnsupportedEvent {
                dialect: self.name(),
                event: "path addressing".into(),
            }),
        }
    }

    /// Extracts the send timestamp (milliseconds) embedded in a synthetic
    /// heartbeat item, used for round-trip latency measurement.
    pub fn heartbeat_timestamp(&self, item: &Item) -> Option<u64> {
        match self {
            Dialect::Full => item
                .field("variations")
                .and_then(|v| v.get(0))
                .and_then(Value::as_u64),
            Dialect::Targeted => item.field("value").and_then(Value::as_u64),
        }
    }
}

/// The collection map key is authoritative: it is written into each item
/// so key-less wire items (the targeted variant) and mismatched embedded
/// keys both resolve consistently.
fn collections_to_data_set(
    flags: Map<String, Value>,
    segments: Map<String, Value>,
) -> ProtocolResult<DataSet> {
    let mut segment_items = Vec::with_capacity(segments.len());
    for (key, value) in segments {
        segment_items.push(Item::from_json_with_key(&key, value)?);
    }
    let mut flag_items = Vec::with_capacity(flags.len());
    for (key, value) in flags {
        flag_items.push(Item::from_json_with_key(&key, value)?);
    }
    Ok(DataSet::new()
        .with_collection(DataKind::Segments, segment_items)
        .with_collection(DataKind::Flags, flag_items))
}

fn flat_flags_to_data_set(flags: Map<String, Value>) -> ProtocolResult<DataSet> {
    let mut items = Vec::with_capacity(flags.len());
    for (key, value) in flags {
        items.push(Item::from_json_with_key(&key, value)?);
    }
    Ok(DataSet::new().with_collection(DataKind::Flags, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_put_decodes_both_collections() {
        let data = r#"{"data":{
            "flags":{"f1":{"version":1},"f2":{"version":2}},
            "segments":{"s1":{"version":3}}
        }}"#;
        let set = Dialect::Full.decode_put(data).unwrap();
        assert_eq!(set.count(DataKind::Flags), 2);
        assert_eq!(set.count(DataKind::Segments), 1);
        // Segments are ordered ahead of flags for init.
        assert_eq!(set.collections()[0].0, DataKind::Segments);
    }

    #[test]
    fn targeted_put_is_flags_only_with_injected_keys() {
        let data = r#"{"f1":{"version":4},"f2":{"version":5}}"#;
        let set = Dialect::Targeted.decode_put(data).unwrap();
        assert_eq!(set.count(DataKind::Flags), 2);
        assert_eq!(set.count(DataKind::Segments), 0);
        let flags = &set.collections()[0].1;
        assert!(flags.iter().any(|i| i.key() == "f1" && i.version() == 4));
    }

    #[test]
    fn full_patch_resolves_path() {
        let target = Dialect::Full
            .decode_patch(r#"{"path":"/segments/s1","data":{"version":7}}"#)
            .unwrap();
        assert_eq!(target.kind, DataKind::Segments);
        assert_eq!(target.item.key(), "s1");
        assert_eq!(target.item.version(), 7);
    }

    #[test]
    fn full_patch_unknown_path() {
        let err = Dialect::Full
            .decode_patch(r#"{"path":"/widgets/w1","data":{"version":1}}"#)
            .unwrap_err();
        assert!(err.is_unknown_path());
    }

    #[test]
    fn targeted_patch_uses_embedded_key() {
        let target = Dialect::Targeted
            .decode_patch(r#"{"key":"f1","version":8,"value":true}"#)
            .unwrap();
        assert_eq!(target.kind, DataKind::Flags);
        assert_eq!(target.item.key(), "f1");
    }

    #[test]
    fn deletes_in_both_dialects() {
        let (kind, key, version) = Dialect::Full
            .decode_delete(r#"{"path":"/flags/f1","version":9}"#)
            .unwrap();
        assert_eq!((kind, key.as_str(), version), (DataKind::Flags, "f1", 9));

        let (kind, key, version) = Dialect::Targeted
            .decode_delete(r#"{"key":"f2","version":10}"#)
            .unwrap();
        assert_eq!((kind, key.as_str(), version), (DataKind::Flags, "f2", 10));
    }

    #[test]
    fn event_support_tables() {
        assert!(Dialect::Full.supports_event("indirect/patch"));
        assert!(!Dialect::Full.supports_event("ping"));
        assert!(Dialect::Targeted.supports_event("ping"));
        assert!(!Dialect::Targeted.supports_event("indirect/put"));
    }

    #[test]
    fn targeted_path_addressing_is_a_usage_error() {
        assert!(matches!(
            Dialect::Targeted.resolve_path("/flags/x"),
            Err(ProtocolError::UnsupportedEvent { .. })
        ));
    }

    #[test]
    fn heartbeat_timestamps_per_dialect() {
        let full_item =
            Item::from_json(json!({"key":"hb","version":1,"variations":[1700000000123u64]}))
                .unwrap();
        assert_eq!(
            Dialect::Full.heartbeat_timestamp(&full_item),
            Some(1700000000123)
        );

        let targeted_item =
            Item::from_json(json!({"key":"hb","version":1,"value":1700000000456u64})).unwrap();
        assert_eq!(
            Dialect::Targeted.heartbeat_timestamp(&targeted_item),
            Some(1700000000456)
        );
        assert_eq!(Dialect::Targeted.heartbeat_timestamp(&full_item), None);
    }
}
