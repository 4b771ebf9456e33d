//! Streaming update processor: connection lifecycle and reconnects.

use crate::backoff::BackoffSchedule;
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::http::{stream_headers, ChunkSource, HttpRequest, Requester};
use crate::poller::PollingFetcher;
use crate::processor::{EventOutcome, EventProcessor, ProcessorState, UpdateProcessor};
use crate::readiness::ReadyGate;
use crate::telemetry::{MessageOutcome, TelemetryEvent, TelemetrySink};
use flagsync_protocol::FrameDecoder;
use flagsync_store::FeatureStore;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Maintains a streaming connection and applies its events to the store.
///
/// Connection establishment retries with jittered exponential backoff;
/// drops of an established stream reconnect after a short fixed delay
/// (or the server's `retry` hint). An unrecoverable HTTP status stops
/// the processor for good and releases readiness waiters so startup
/// fails fast instead of hanging.
pub struct StreamingProcessor {
    config: Arc<Config>,
    requester: Arc<dyn Requester>,
    store: Arc<dyn FeatureStore>,
    events: EventProcessor,
    ready: Arc<ReadyGate>,
    telemetry: Arc<dyn TelemetrySink>,
    stop: ReadyGate,
    state: RwLock<ProcessorState>,
    last_event_id: Mutex<Option<String>>,
    retry_hint: Mutex<Option<Duration>>,
}

impl StreamingProcessor {
    /// Wires a processor to its collaborators. Nothing connects until
    /// [`run`](UpdateProcessor::run) is called.
    pub fn new(
        config: Arc<Config>,
        requester: Arc<dyn Requester>,
        store: Arc<dyn FeatureStore>,
        fetcher: Arc<PollingFetcher>,
        ready: Arc<ReadyGate>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> StreamingProcessor {
        let events = EventProcessor::new(
            config.clone(),
            store.clone(),
            fetcher,
            telemetry.clone(),
        );
        StreamingProcessor {
            config,
            requester,
            store,
            events,
            ready,
            telemetry,
            stop: ReadyGate::new(),
            state: RwLock::new(ProcessorState::Connecting),
            last_event_id: Mutex::new(None),
            retry_hint: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessorState {
        *self.state.read()
    }

    fn set_state(&self, state: ProcessorState) {
        *self.state.write() = state;
    }

    fn connect(&self) -> EngineResult<Box<dyn ChunkSource>> {
        let mut request = HttpRequest::get(self.config.stream_request_uri())
            .with_headers(stream_headers(&self.config))
            .with_timeouts(self.config.connect_timeout, self.config.stream_read_timeout);
        if let Some(id) = self.last_event_id.lock().clone() {
            request = request.with_header("Last-Event-ID", id);
        }
        self.requester.open_stream(&request)
    }

    /// Consumes one connection until it drops or a stop is requested.
    /// `Ok(())` means a stop; any drop comes back as an error so the
    /// outer loop reconnects.
    fn read_stream(
        &self,
        source: &mut dyn ChunkSource,
        init_started: Instant,
    ) -> EngineResult<()> {
        let mut decoder = FrameDecoder::new();
        let mut last_beat = Instant::now();

        loop {
            if self.stop.is_set() {
                return Ok(());
            }
            let chunk = match source.next_chunk() {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    decoder.discard_partial_line();
                    return Err(EngineError::Transport("stream ended".into()));
                }
                Err(err) => {
                    decoder.discard_partial_line();
                    return Err(err);
                }
            };
            decoder.feed(&chunk);

            while let Some(event) = decoder.next_event() {
                if self.stop.is_set() {
                    return Ok(());
                }
                if let Some(id) = &event.id {
                    *self.last_event_id.lock() = Some(id.clone());
                }
                if let Some(millis) = event.retry {
                    debug!(millis, "server adjusted reconnect delay");
                    *self.retry_hint.lock() = Some(Duration::from_millis(millis));
                }
                let outcome = match self.events.process_event(&event) {
                    Ok(EventOutcome::FullSync) => {
                        if !self.ready.is_set() {
                            info!("streaming processor initialized");
                            self.telemetry.record(TelemetryEvent::InitComplete {
                                ok: true,
                                elapsed: init_started.elapsed(),
                            });
                            self.ready.set();
                        }
                        self.set_state(ProcessorState::Live);
                        MessageOutcome::FullSync
                    }
                    Ok(EventOutcome::Applied) => MessageOutcome::Applied,
                    Ok(EventOutcome::DroppedUnknownPath) => MessageOutcome::DroppedUnknownPath,
                    Ok(EventOutcome::Ignored) => MessageOutcome::Ignored,
                    Err(err) => {
                        warn!(event = %event.event, error = %err, "dropping stream message");
                        MessageOutcome::DroppedMalformed
                    }
                };
                self.telemetry.record(TelemetryEvent::Message {
                    event: event.event.clone(),
                    outcome,
                });
            }

            for _ in 0..decoder.take_comment_count() {
                let now = Instant::now();
                self.telemetry.record(TelemetryEvent::Heartbeat {
                    since_last: now - last_beat,
                });
                last_beat = now;
            }
        }
    }
}

impl UpdateProcessor for StreamingProcessor {
    fn run(&self) {
        info!(uri = %self.config.stream_request_uri(), "starting streaming processor");
        let mut backoff =
            BackoffSchedule::new(self.config.initial_backoff, self.config.max_backoff);
        let init_started = Instant::now();

        while !self.stop.is_set() {
            self.set_state(ProcessorState::Connecting);
            let mut source = match self.connect() {
                Ok(source) => {
                    backoff.reset();
                    source
                }
                Err(err) if err.is_recoverable() => {
                    let delay = backoff.next_delay();
                    warn!(error = %err, ?delay, "stream connection failed, backing off");
                    if self.stop.wait_timeout(delay) {
                        break;
                    }
                    continue;
                }
                Err(err) => {
                    error!(error = %err, "unrecoverable stream failure, giving up");
                    self.set_state(ProcessorState::Failed);
                    self.telemetry.record(TelemetryEvent::InitComplete {
                        ok: false,
                        elapsed: init_started.elapsed(),
                    });
                    // Release waiters; initialized() stays false.
                    self.ready.set();
                    return;
                }
            };

            self.set_state(if self.store.initialized() {
                ProcessorState::Live
            } else {
                ProcessorState::Syncing
            });
            self.telemetry.record(TelemetryEvent::StreamConnected);
            let connected_at = Instant::now();

            match self.read_stream(source.as_mut(), init_started) {
                Ok(()) => break,
                Err(err) => {
                    warn!(error = %err, "stream dropped, will reconnect");
                }
            }
            self.telemetry.record(TelemetryEvent::StreamDisconnected {
                connected_for: connected_at.elapsed(),
            });

            let delay = (*self.retry_hint.lock()).unwrap_or(self.config.stream_drop_delay);
            if self.stop.wait_timeout(delay) {
                break;
            }
        }

        self.set_state(ProcessorState::Stopped);
        info!("streaming processor stopped");
    }

    fn stop(&self) {
        info!("stopping streaming processor");
        self.stop.set();
    }

    fn initialized(&self) -> bool {
        !self.stop.is_set()
            && self.state() != ProcessorState::Failed
            && self.ready.is_set()
            && self.store.initialized()
    }
}
