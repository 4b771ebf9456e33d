//! Conditional polling against the buffered endpoints.

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::http::{base_headers, HttpRequest, Requester};
use flagsync_protocol::Dialect;
use flagsync_store::{DataKind, DataSet, Item};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

struct CacheEntry {
    data: Value,
    etag: String,
}

/// Fetches full or single-item payloads with conditional requests.
///
/// Successful responses that carry an `ETag` are cached per request URI;
/// later requests send `If-None-Match` and a 304 answer re-serves the
/// cached payload without re-parsing a body. The cache is never evicted:
/// each distinct URI holds at most one entry and a client polls a small,
/// fixed set of URIs.
pub struct PollingFetcher {
    config: Arc<Config>,
    requester: Arc<dyn Requester>,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl PollingFetcher {
    /// Creates a fetcher with an empty cache.
    pub fn new(config: Arc<Config>, requester: Arc<dyn Requester>) -> PollingFetcher {
        PollingFetcher {
            config,
            requester,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches the complete data set for the configured dialect.
    pub fn fetch_all(&self) -> EngineResult<DataSet> {
        let parts = self.config.poll_all_parts();
        let body = self.request_json(parts.method, parts.uri, parts.cache_uri, parts.body)?;
        Ok(self.config.dialect.decode_poll_all(&body)?)
    }

    /// Fetches one item by collection and key.
    ///
    /// Only the full dialect exposes single-item endpoints.
    pub fn fetch_one(&self, kind: DataKind, key: &str) -> EngineResult<Item> {
        if self.config.dialect == Dialect::Targeted {
            return Err(EngineError::Unsupported(
                "single-item fetch is not available in the targeted dialect",
            ));
        }
        let uri = self.config.poll_one_uri(kind.poll_sub_path(), key);
        let body = self.request_json(crate::http::Method::Get, uri.clone(), uri, None)?;
        Item::from_json_with_key(key, body)
            .map_err(|err| EngineError::Protocol(err.into()))
    }

    fn request_json(
        &self,
        method: crate::http::Method,
        uri: String,
        cache_uri: String,
        body: Option<Vec<u8>>,
    ) -> EngineResult<Value> {
        let mut request = HttpRequest::get(uri)
            .with_method(method)
            .with_headers(base_headers(&self.config))
            .with_timeouts(self.config.connect_timeout, self.config.read_timeout);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        if let Some(entry) = self.cache.lock().get(&cache_uri) {
            request = request.with_header("If-None-Match", entry.etag.clone());
        }

        let response = self.requester.fetch(&request)?;
        match response.status {
            304 => {
                let cache = self.cache.lock();
                match cache.get(&cache_uri) {
                    Some(entry) => {
                        debug!(uri = %cache_uri, "payload unchanged, serving cached copy");
                        Ok(entry.data.clone())
                    }
                    None => Err(EngineError::NotModifiedWithoutCache),
                }
            }
            status if response.is_success() => {
                let data: Value = serde_json::from_slice(&response.body)
                    .map_err(|err| EngineError::Protocol(err.into()))?;
                if let Some(etag) = response.header("ETag") {
                    self.cache.lock().insert(
                        cache_uri,
                        CacheEntry {
                            data: data.clone(),
                            etag: etag.to_string(),
                        },
                    );
                } else {
                    debug!(status, "response carried no etag, skipping cache");
                }
                Ok(data)
            }
            status => Err(EngineError::HttpStatus { status }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ChunkSource, HttpResponse};
    use serde_json::json;

    /// Minimal scripted requester local to this module; the shared
    /// test double lives in the testkit crate, which depends on this one.
    struct Scripted {
        responses: Mutex<Vec<HttpResponse>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<HttpResponse>) -> Scripted {
            Scripted {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Requester for Scripted {
        fn fetch(&self, request: &HttpRequest) -> EngineResult<HttpResponse> {
            self.seen.lock().push(request.clone());
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                return Err(EngineError::Transport("no scripted response".into()));
            }
            Ok(responses.remove(0))
        }

        fn open_stream(&self, _request: &HttpRequest) -> EngineResult<Box<dyn ChunkSource>> {
            Err(EngineError::Transport("streaming not scripted".into()))
        }
    }

    fn ok_with_etag(body: &Value, etag: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: vec![("ETag".into(), etag.into())],
            body: body.to_string().into_bytes(),
        }
    }

    fn fetcher(responses: Vec<HttpResponse>) -> (PollingFetcher, Arc<Scripted>) {
        let requester = Arc::new(Scripted::new(responses));
        let config = Arc::new(Config::new("key").with_base_uri("https://sdk.example"));
        (
            PollingFetcher::new(config, requester.clone() as Arc<dyn Requester>),
            requester,
        )
    }

    #[test]
    fn fetch_all_decodes_collections() {
        let body = json!({"flags": {"f1": {"version": 1}}, "segments": {}});
        let (fetcher, _) = fetcher(vec![ok_with_etag(&body, "\"v1\"")]);
        let set = fetcher.fetch_all().unwrap();
        assert_eq!(set.count(DataKind::Flags), 1);
    }

    #[test]
    fn not_modified_serves_cached_payload() {
        let body = json!({"flags": {"f1": {"version": 1}}, "segments": {}});
        let (fetcher, requester) = fetcher(vec![
            ok_with_etag(&body, "\"v1\""),
            HttpResponse {
                status: 304,
                headers: Vec::new(),
                body: Vec::new(),
            },
        ]);

        fetcher.fetch_all().unwrap();
        let second = fetcher.fetch_all().unwrap();
        assert_eq!(second.count(DataKind::Flags), 1);

        let seen = requester.seen.lock();
        assert_eq!(seen[0].header("If-None-Match"), None);
        assert_eq!(seen[1].header("If-None-Match"), Some("\"v1\""));
    }

    #[test]
    fn etag_is_kept_verbatim() {
        let body = json!({"flags": {}, "segments": {}});
        let (fetcher, requester) = fetcher(vec![
            ok_with_etag(&body, "W/\"weak-123\""),
            HttpResponse {
                status: 304,
                headers: Vec::new(),
                body: Vec::new(),
            },
        ]);
        fetcher.fetch_all().unwrap();
        fetcher.fetch_all().unwrap();
        assert_eq!(
            requester.seen.lock()[1].header("If-None-Match"),
            Some("W/\"weak-123\"")
        );
    }

    #[test]
    fn not_modified_without_cache_is_an_error() {
        let (fetcher, _) = fetcher(vec![HttpResponse {
            status: 304,
            headers: Vec::new(),
            body: Vec::new(),
        }]);
        assert!(matches!(
            fetcher.fetch_all(),
            Err(EngineError::NotModifiedWithoutCache)
        ));
    }

    #[test]
    fn non_success_status_surfaces() {
        let (fetcher, _) = fetcher(vec![HttpResponse {
            status: 503,
            headers: Vec::new(),
            body: Vec::new(),
        }]);
        assert!(matches!(
            fetcher.fetch_all(),
            Err(EngineError::HttpStatus { status: 503 })
        ));
    }

    #[test]
    fn fetch_one_injects_the_requested_key() {
        let body = json!({"version": 4, "on": true});
        let (fetcher, requester) = fetcher(vec![ok_with_etag(&body, "\"f\"")]);
        let item = fetcher.fetch_one(DataKind::Flags, "my-flag").unwrap();
        assert_eq!(item.key(), "my-flag");
        assert_eq!(item.version(), 4);
        assert!(requester.seen.lock()[0]
            .uri
            .ends_with("/sdk/latest-flags/my-flag"));
    }

    #[test]
    fn targeted_fetch_one_is_unsupported() {
        let requester = Arc::new(Scripted::new(Vec::new()));
        let config = Arc::new(Config::targeted("key", json!({"key": "u"})));
        let fetcher = PollingFetcher::new(config, requester as Arc<dyn Requester>);
        assert!(matches!(
            fetcher.fetch_one(DataKind::Flags, "f"),
            Err(EngineError::Unsupported(_))
        ));
    }
}
