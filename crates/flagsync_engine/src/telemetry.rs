//! Observability hooks.
//!
//! The processors report lifecycle and per-message outcomes through a
//! [`TelemetrySink`] so harnesses can measure propagation latency and
//! reconnect behavior without scraping logs.

use parking_lot::Mutex;
use std::time::Duration;

/// What became of one stream message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// An item was upserted or deleted.
    Applied,
    /// The whole store was replaced.
    FullSync,
    /// Dropped: the path matched no known collection.
    DroppedUnknownPath,
    /// Dropped: the payload could not be decoded or an indirect fetch
    /// failed.
    DroppedMalformed,
    /// The event tag carries no meaning in the active dialect.
    Ignored,
}

/// Events the processors emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    /// Initialization finished, successfully or not.
    InitComplete {
        /// Whether a first full sync was applied.
        ok: bool,
        /// Time from processor start to this outcome.
        elapsed: Duration,
    },
    /// A stream connection was established.
    StreamConnected,
    /// An established stream dropped.
    StreamDisconnected {
        /// How long the connection had been up.
        connected_for: Duration,
    },
    /// A liveness comment arrived on the stream.
    Heartbeat {
        /// Time since the previous heartbeat (or connect).
        since_last: Duration,
    },
    /// A synthetic probe flag measured end-to-end update latency.
    UpdateLatency {
        /// Publish-to-apply round trip.
        latency: Duration,
    },
    /// One stream message was processed.
    Message {
        /// The event tag.
        event: String,
        /// How it was handled.
        outcome: MessageOutcome,
    },
}

/// Receiver for telemetry events. Implementations must be cheap; they
/// are called from the processing thread.
pub trait TelemetrySink: Send + Sync {
    /// Records one event.
    fn record(&self, event: TelemetryEvent);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn record(&self, _event: TelemetryEvent) {}
}

/// Buffers events for inspection. Intended for tests and harnesses.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    /// Creates an empty recorder.
    pub fn new() -> RecordingTelemetry {
        RecordingTelemetry::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    /// Outcomes of all `Message` events, in order.
    pub fn message_outcomes(&self) -> Vec<MessageOutcome> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TelemetryEvent::Message { outcome, .. } => Some(outcome.clone()),
                _ => None,
            })
            .collect()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record(&self, event: TelemetryEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_order() {
        let sink = RecordingTelemetry::new();
        sink.record(TelemetryEvent::StreamConnected);
        sink.record(TelemetryEvent::Message {
            event: "put".into(),
            outcome: MessageOutcome::FullSync,
        });
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(sink.message_outcomes(), vec![MessageOutcome::FullSync]);
    }
}
