//! Exact wire payload shapes.
//!
//! Field names here are part of the wire contract and must not change.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Full-dialect `put` payload: `{"data": {"flags": {...}, "segments": {...}}}`.
#[derive(Debug, Deserialize)]
pub struct PutEnvelope {
    /// The enclosed collections.
    pub data: AllCollections,
}

/// Both collections as key→item maps.
#[derive(Debug, Deserialize)]
pub struct AllCollections {
    /// Flag definitions keyed by flag key.
    #[serde(default)]
    pub flags: Map<String, Value>,
    /// Segment definitions keyed by segment key.
    #[serde(default)]
    pub segments: Map<String, Value>,
}

/// Full-dialect `patch` payload: `{"path": "<prefix><key>", "data": item}`.
#[derive(Debug, Deserialize)]
pub struct PatchPayload {
    /// Collection-prefixed item path.
    pub path: String,
    /// The new item definition.
    pub data: Value,
}

/// Full-dialect `delete` payload: `{"path": "<prefix><key>", "version": n}`.
#[derive(Debug, Deserialize)]
pub struct DeletePayload {
    /// Collection-prefixed item path.
    pub path: String,
    /// Version of the delete; gated like an upsert.
    pub version: u64,
}

/// Targeted-dialect `delete` payload: `{"key": ..., "version": ...}`.
#[derive(Debug, Deserialize)]
pub struct KeyedDelete {
    /// The flag key to delete.
    pub key: String,
    /// Version of the delete; gated like an upsert.
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_envelope_shape() {
        let envelope: PutEnvelope = serde_json::from_str(
            r#"{"data":{"flags":{"f":{"key":"f","version":1}},"segments":{}}}"#,
        )
        .unwrap();
        assert_eq!(envelope.data.flags.len(), 1);
        assert!(envelope.data.segments.is_empty());
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let envelope: PutEnvelope = serde_json::from_str(r#"{"data":{}}"#).unwrap();
        assert!(envelope.data.flags.is_empty());
        assert!(envelope.data.segments.is_empty());
    }

    #[test]
    fn patch_and_delete_shapes() {
        let patch: PatchPayload =
            serde_json::from_str(r#"{"path":"/flags/f","data":{"key":"f","version":2}}"#).unwrap();
        assert_eq!(patch.path, "/flags/f");

        let delete: DeletePayload =
            serde_json::from_str(r#"{"path":"/segments/s","version":9}"#).unwrap();
        assert_eq!(delete.version, 9);

        let keyed: KeyedDelete = serde_json::from_str(r#"{"key":"f","version":3}"#).unwrap();
        assert_eq!(keyed.key, "f");
    }
}
