//! Wire-format builders for tests.

use flagsync_engine::HttpResponse;
use serde_json::{json, Value};

/// A minimal flag definition.
pub fn flag(key: &str, version: u64) -> Value {
    json!({
        "key": key,
        "version": version,
        "on": true,
        "variations": [true, false],
    })
}

/// A minimal segment definition.
pub fn segment(key: &str, version: u64) -> Value {
    json!({
        "key": key,
        "version": version,
        "included": [],
        "excluded": [],
    })
}

/// One raw stream frame: `event:` line, `data:` line, blank line.
pub fn sse_frame(event: &str, data: &str) -> Vec<u8> {
    format!("event: {event}\ndata: {data}\n\n").into_bytes()
}

/// A liveness comment frame.
pub fn heartbeat_comment() -> Vec<u8> {
    b": keepalive\n\n".to_vec()
}

/// Full-dialect poll body holding the given flags and segments.
pub fn full_put_body(flags: &[(&str, u64)], segments: &[(&str, u64)]) -> Value {
    let flags: serde_json::Map<String, Value> = flags
        .iter()
        .map(|(key, version)| (key.to_string(), flag(key, *version)))
        .collect();
    let segments: serde_json::Map<String, Value> = segments
        .iter()
        .map(|(key, version)| (key.to_string(), segment(key, *version)))
        .collect();
    json!({"flags": flags, "segments": segments})
}

/// Full-dialect `put` frame.
pub fn full_put_frame(flags: &[(&str, u64)], segments: &[(&str, u64)]) -> Vec<u8> {
    let body = json!({"data": full_put_body(flags, segments)});
    sse_frame("put", &body.to_string())
}

/// Targeted-dialect `put` frame (flat key to flag map).
pub fn targeted_put_frame(flags: &[(&str, u64)]) -> Vec<u8> {
    let map: serde_json::Map<String, Value> = flags
        .iter()
        .map(|(key, version)| (key.to_string(), flag(key, *version)))
        .collect();
    sse_frame("put", &Value::Object(map).to_string())
}

/// Full-dialect `patch` frame for the given path.
pub fn patch_frame(path: &str, item: Value) -> Vec<u8> {
    sse_frame("patch", &json!({"path": path, "data": item}).to_string())
}

/// Full-dialect `delete` frame.
pub fn delete_frame(path: &str, version: u64) -> Vec<u8> {
    sse_frame(
        "delete",
        &json!({"path": path, "version": version}).to_string(),
    )
}

/// A 200 response with a JSON body and optional `ETag`.
pub fn json_response(body: &Value, etag: Option<&str>) -> HttpResponse {
    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    if let Some(etag) = etag {
        headers.push(("ETag".to_string(), etag.to_string()));
    }
    HttpResponse {
        status: 200,
        headers,
        body: body.to_string().into_bytes(),
    }
}

/// A bodyless response with the given status.
pub fn status_response(status: u16) -> HttpResponse {
    HttpResponse {
        status,
        headers: Vec::new(),
        body: Vec::new(),
    }
}
