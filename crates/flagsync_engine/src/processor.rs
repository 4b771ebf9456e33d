//! Stream event application.
//!
//! [`EventProcessor`] turns decoded stream events into store operations.
//! It is connection-agnostic: the reconnect loop in [`stream`] owns the
//! transport and hands events here one at a time.
//!
//! [`stream`]: crate::stream

use crate::config::Config;
use crate::error::EngineResult;
use crate::poller::PollingFetcher;
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use flagsync_protocol::StreamEvent;
use flagsync_store::{sort_data_set, DataKind, FeatureStore};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Connection lifecycle states, visible for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// Trying to establish a connection.
    Connecting,
    /// Connected, waiting for the first full sync.
    Syncing,
    /// Serving live updates.
    Live,
    /// Gave up permanently on an unrecoverable error.
    Failed,
    /// Stopped on request.
    Stopped,
}

/// A long-running source of store updates.
pub trait UpdateProcessor: Send + Sync {
    /// Runs until stopped or failed. Blocking; callers put this on its
    /// own thread.
    fn run(&self);

    /// Requests a stop. Idempotent; `run` returns promptly.
    fn stop(&self);

    /// True once running with an initialized store.
    fn initialized(&self) -> bool;
}

/// What one processed event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The store was atomically re-initialized.
    FullSync,
    /// One item was upserted or deleted.
    Applied,
    /// Dropped: unresolvable path. The store is untouched.
    DroppedUnknownPath,
    /// The event tag means nothing in this dialect.
    Ignored,
}

/// Applies decoded stream events to the store.
pub struct EventProcessor {
    config: Arc<Config>,
    store: Arc<dyn FeatureStore>,
    fetcher: Arc<PollingFetcher>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl EventProcessor {
    /// Creates a processor bound to a store and a fetcher for indirect
    /// messages.
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn FeatureStore>,
        fetcher: Arc<PollingFetcher>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> EventProcessor {
        EventProcessor {
            config,
            store,
            fetcher,
            telemetry,
        }
    }

    /// Applies one event.
    ///
    /// Errors are message-level: the caller logs, drops the event, and
    /// keeps the connection. The store is never left half-updated by a
    /// failed event.
    pub fn process_event(&self, event: &StreamEvent) -> EngineResult<EventOutcome> {
        let dialect = self.config.dialect;
        let tag = event.event.as_str();
        if !dialect.supports_event(tag) {
            warn!(event = tag, dialect = dialect.name(), "unhandled stream event");
            return Ok(EventOutcome::Ignored);
        }

        match tag {
            "put" => {
                let set = dialect.decode_put(&event.data)?;
                debug!(
                    flags = set.count(DataKind::Flags),
                    segments = set.count(DataKind::Segments),
                    "applying full sync"
                );
                self.store.init(sort_data_set(set));
                Ok(EventOutcome::FullSync)
            }
            "patch" => match dialect.decode_patch(&event.data) {
                Ok(target) => {
                    self.observe_heartbeat(&target.item);
                    debug!(kind = ?target.kind, key = target.item.key(), "applying patch");
                    self.store.upsert(target.kind, target.item);
                    Ok(EventOutcome::Applied)
                }
                Err(err) if err.is_unknown_path() => {
                    warn!(error = %err, "dropping patch");
                    Ok(EventOutcome::DroppedUnknownPath)
                }
                Err(err) => Err(err.into()),
            },
            "delete" => {
                let (kind, key, version) = dialect.decode_delete(&event.data)?;
                debug!(?kind, key, version, "applying delete");
                self.store.delete(kind, &key, version);
                Ok(EventOutcome::Applied)
            }
            "indirect/patch" => match dialect.resolve_path(event.data.trim()) {
                Ok((kind, key)) => {
                    let item = self.fetcher.fetch_one(kind, &key)?;
                    self.observe_heartbeat(&item);
                    debug!(?kind, key, "applied indirectly fetched item");
                    self.store.upsert(kind, item);
                    Ok(EventOutcome::Applied)
                }
                Err(err) if err.is_unknown_path() => {
                    warn!(error = %err, "dropping indirect patch");
                    Ok(EventOutcome::DroppedUnknownPath)
                }
                Err(err) => Err(err.into()),
            },
            // Both mean: discard the delta and refetch everything.
            "indirect/put" | "ping" => {
                let set = self.fetcher.fetch_all()?;
                debug!("applying refetched full sync");
                self.store.init(sort_data_set(set));
                Ok(EventOutcome::FullSync)
            }
            other => {
                warn!(event = other, "unhandled stream event");
                Ok(EventOutcome::Ignored)
            }
        }
    }

    /// When the synthetic probe flag updates, its payload carries the
    /// publish timestamp; the difference to now is the end-to-end
    /// propagation latency.
    fn observe_heartbeat(&self, item: &flagsync_store::Item) {
        if item.key() != self.config.heartbeat_key {
            return;
        }
        if let Some(sent_ms) = self.config.dialect.heartbeat_timestamp(item) {
            let latency = Duration::from_millis(now_millis().saturating_sub(sent_ms));
            self.telemetry
                .record(TelemetryEvent::UpdateLatency { latency });
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::http::{ChunkSource, HttpRequest, HttpResponse, Requester};
    use crate::telemetry::RecordingTelemetry;
    use flagsync_store::MemoryStore;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Scripted {
        responses: Mutex<Vec<HttpResponse>>,
    }

    impl Requester for Scripted {
        fn fetch(&self, _request: &HttpRequest) -> EngineResult<HttpResponse> {
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

    struct Fixture {
        store: Arc<MemoryStore>,
        telemetry: Arc<RecordingTelemetry>,
        processor: EventProcessor,
    }

    fn fixture(config: Config, responses: Vec<HttpResponse>) -> Fixture {
        let config = Arc::new(config);
        let store = Arc::new(MemoryStore::new());
        let telemetry = Arc::new(RecordingTelemetry::new());
        let requester = Arc::new(Scripted {
            responses: Mutex::new(responses),
        });
        let fetcher = Arc::new(PollingFetcher::new(config.clone(), requester));
        let processor = EventProcessor::new(
            config,
            store.clone(),
            fetcher,
            telemetry.clone(),
        );
        Fixture {
            store,
            telemetry,
            processor,
        }
    }

    fn event(tag: &str, data: &str) -> StreamEvent {
        StreamEvent::new(tag, data)
    }

    fn json_response(body: &serde_json::Value) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: body.to_string().into_bytes(),
        }
    }

    #[test]
    fn put_initializes_the_store() {
        let f = fixture(Config::new("key"), Vec::new());
        let data = r#"{"data":{"flags":{"f1":{"version":1}},"segments":{"s1":{"version":1}}}}"#;
        let outcome = f.processor.process_event(&event("put", data)).unwrap();
        assert_eq!(outcome, EventOutcome::FullSync);
        assert!(f.store.initialized());
        assert!(f.store.get(DataKind::Flags, "f1").is_some());
        assert!(f.store.get(DataKind::Segments, "s1").is_some());
    }

    #[test]
    fn patch_upserts_version_gated() {
        let f = fixture(Config::new("key"), Vec::new());
        f.processor
            .process_event(&event(
                "put",
                r#"{"data":{"flags":{"f1":{"version":5}},"segments":{}}}"#,
            ))
            .unwrap();

        // Stale patch loses.
        f.processor
            .process_event(&event(
                "patch",
                r#"{"path":"/flags/f1","data":{"version":3,"on":true}}"#,
            ))
            .unwrap();
        assert_eq!(f.store.get(DataKind::Flags, "f1").unwrap().version(), 5);

        // Newer patch wins.
        f.processor
            .process_event(&event(
                "patch",
                r#"{"path":"/flags/f1","data":{"version":6,"on":true}}"#,
            ))
            .unwrap();
        assert_eq!(f.store.get(DataKind::Flags, "f1").unwrap().version(), 6);
    }

    #[test]
    fn unknown_path_is_dropped_without_store_damage() {
        let f = fixture(Config::new("key"), Vec::new());
        f.processor
            .process_event(&event(
                "put",
                r#"{"data":{"flags":{"f1":{"version":1}},"segments":{}}}"#,
            ))
            .unwrap();
        let outcome = f
            .processor
            .process_event(&event(
                "patch",
                r#"{"path":"/widgets/w1","data":{"version":9}}"#,
            ))
            .unwrap();
        assert_eq!(outcome, EventOutcome::DroppedUnknownPath);
        assert_eq!(f.store.all(DataKind::Flags).len(), 1);
    }

    #[test]
    fn malformed_payload_is_an_error_not_a_panic() {
        let f = fixture(Config::new("key"), Vec::new());
        let result = f.processor.process_event(&event("put", "{not json"));
        assert!(result.is_err());
        assert!(!f.store.initialized());
    }

    #[test]
    fn delete_tombstones() {
        let f = fixture(Config::new("key"), Vec::new());
        f.processor
            .process_event(&event(
                "put",
                r#"{"data":{"flags":{"f1":{"version":1}},"segments":{}}}"#,
            ))
            .unwrap();
        f.processor
            .process_event(&event("delete", r#"{"path":"/flags/f1","version":2}"#))
            .unwrap();
        assert!(f.store.get(DataKind::Flags, "f1").is_none());
    }

    #[test]
    fn indirect_patch_fetches_and_applies() {
        let f = fixture(
            Config::new("key"),
            vec![json_response(&json!({"version": 7, "on": true}))],
        );
        let outcome = f
            .processor
            .process_event(&event("indirect/patch", "/flags/f9"))
            .unwrap();
        assert_eq!(outcome, EventOutcome::Applied);
        assert_eq!(f.store.get(DataKind::Flags, "f9").unwrap().version(), 7);
    }

    #[test]
    fn indirect_put_refetches_everything() {
        let f = fixture(
            Config::new("key"),
            vec![json_response(
                &json!({"flags": {"f1": {"version": 2}}, "segments": {}}),
            )],
        );
        let outcome = f
            .processor
            .process_event(&event("indirect/put", ""))
            .unwrap();
        assert_eq!(outcome, EventOutcome::FullSync);
        assert!(f.store.initialized());
    }

    #[test]
    fn failed_indirect_fetch_is_a_message_error() {
        let f = fixture(Config::new("key"), Vec::new());
        assert!(f
            .processor
            .process_event(&event("indirect/put", ""))
            .is_err());
        assert!(!f.store.initialized());
    }

    #[test]
    fn targeted_ping_triggers_refetch() {
        let f = fixture(
            Config::targeted("key", json!({"key": "u"})),
            vec![json_response(&json!({"f1": {"version": 3}}))],
        );
        let outcome = f.processor.process_event(&event("ping", "")).unwrap();
        assert_eq!(outcome, EventOutcome::FullSync);
        assert_eq!(f.store.get(DataKind::Flags, "f1").unwrap().version(), 3);
    }

    #[test]
    fn targeted_ignores_full_only_events() {
        let f = fixture(Config::targeted("key", json!({"key": "u"})), Vec::new());
        let outcome = f
            .processor
            .process_event(&event("indirect/put", ""))
            .unwrap();
        assert_eq!(outcome, EventOutcome::Ignored);
    }

    #[test]
    fn full_ignores_ping() {
        let f = fixture(Config::new("key"), Vec::new());
        let outcome = f.processor.process_event(&event("ping", "")).unwrap();
        assert_eq!(outcome, EventOutcome::Ignored);
    }

    #[test]
    fn heartbeat_patch_emits_latency() {
        let f = fixture(
            Config::new("key").with_heartbeat_key("hb-probe"),
            Vec::new(),
        );
        let sent = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        let data = format!(
            r#"{{"path":"/flags/hb-probe","data":{{"version":1,"variations":[{sent}]}}}}"#
        );
        f.processor.process_event(&event("patch", &data)).unwrap();
        assert!(f
            .telemetry
            .events()
            .iter()
            .any(|e| matches!(e, TelemetryEvent::UpdateLatency { .. })));
    }
}
