//! Streaming synchronization engine.
//!
//! Keeps a local [`FeatureStore`] continuously in sync with a flag
//! delivery service, preferring a server-sent event stream and falling
//! back to interval polling. The HTTP client is abstracted behind
//! [`Requester`] so the engine itself stays transport-neutral and fully
//! testable with scripted bytes.
//!
//! The usual entry point is [`SyncClient::start`].
//!
//! [`FeatureStore`]: flagsync_store::FeatureStore

mod backoff;
mod client;
mod config;
mod error;
mod http;
mod poller;
mod polling;
mod processor;
mod readiness;
mod stream;
mod telemetry;

pub use backoff::BackoffSchedule;
pub use client::SyncClient;
pub use config::{Config, PollRequestParts, MIN_POLL_INTERVAL};
pub use error::{is_http_error_recoverable, EngineError, EngineResult};
pub use http::{
    base_headers, stream_headers, ChunkSource, HttpRequest, HttpResponse, Method, Requester,
};
pub use poller::PollingFetcher;
pub use polling::PollingProcessor;
pub use processor::{EventOutcome, EventProcessor, ProcessorState, UpdateProcessor};
pub use readiness::ReadyGate;
pub use stream::StreamingProcessor;
pub use telemetry::{
    MessageOutcome, NullTelemetry, RecordingTelemetry, TelemetryEvent, TelemetrySink,
};
