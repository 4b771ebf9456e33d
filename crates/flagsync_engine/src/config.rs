//! Client configuration.

use crate::http::Method;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use flagsync_protocol::Dialect;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

const DEFAULT_BASE_URI: &str = "https://sdk.flagsync.io";
const DEFAULT_STREAM_URI: &str = "https://stream.flagsync.io";

/// Shortest poll interval the service will tolerate.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Everything that shapes a client's behavior. Built with `with_*`
/// setters; the defaults are production values, tests dial the delays
/// down to keep runs fast.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service credential sent in the `Authorization` header.
    pub credential: String,
    /// Base URI of the polling service.
    pub base_uri: String,
    /// Base URI of the streaming service.
    pub stream_uri: String,
    /// Wire variant to speak.
    pub dialect: Dialect,
    /// Streaming (true) or interval polling (false).
    pub streaming: bool,
    /// Interval between polls when streaming is off.
    pub poll_interval: Duration,
    /// Time allowed to establish any connection.
    pub connect_timeout: Duration,
    /// Read timeout for buffered requests.
    pub read_timeout: Duration,
    /// Read timeout between stream chunks.
    pub stream_read_timeout: Duration,
    /// Initial reconnect backoff cap.
    pub initial_backoff: Duration,
    /// Largest reconnect backoff cap.
    pub max_backoff: Duration,
    /// Fixed delay before reconnecting a stream that had been established.
    pub stream_drop_delay: Duration,
    /// Default wait used by client start helpers.
    pub start_wait: Duration,
    /// Ask the service to include evaluation reasons in targeted payloads.
    pub evaluation_reasons: bool,
    /// Use REPORT with a body instead of encoding the context in the URL.
    pub use_report: bool,
    /// Evaluation context for the targeted dialect.
    pub context: Option<Value>,
    /// Flag key carrying synthetic latency probes.
    pub heartbeat_key: String,
    /// Never open a connection; the store stays empty.
    pub offline: bool,
}

impl Config {
    /// Configuration for the full (multi-collection) dialect.
    pub fn new(credential: impl Into<String>) -> Config {
        Config {
            credential: credential.into(),
            base_uri: DEFAULT_BASE_URI.into(),
            stream_uri: DEFAULT_STREAM_URI.into(),
            dialect: Dialect::Full,
            streaming: true,
            poll_interval: MIN_POLL_INTERVAL,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(15),
            stream_read_timeout: Duration::from_secs(300),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            stream_drop_delay: Duration::from_secs(1),
            start_wait: Duration::from_secs(5),
            evaluation_reasons: false,
            use_report: false,
            context: None,
            heartbeat_key: "hb-probe".into(),
            offline: false,
        }
    }

    /// Configuration for the targeted dialect, scoped to one evaluation
    /// context.
    pub fn targeted(credential: impl Into<String>, context: Value) -> Config {
        let mut config = Config::new(credential);
        config.dialect = Dialect::Targeted;
        config.context = Some(context);
        config
    }

    /// Overrides the polling base URI.
    pub fn with_base_uri(mut self, uri: impl Into<String>) -> Config {
        self.base_uri = trim_trailing_slash(uri.into());
        self
    }

    /// Overrides the streaming base URI.
    pub fn with_stream_uri(mut self, uri: impl Into<String>) -> Config {
        self.stream_uri = trim_trailing_slash(uri.into());
        self
    }

    /// Switches between streaming and interval polling.
    pub fn with_streaming(mut self, streaming: bool) -> Config {
        self.streaming = streaming;
        self
    }

    /// Sets the poll interval, clamped to the service minimum.
    pub fn with_poll_interval(mut self, interval: Duration) -> Config {
        if interval < MIN_POLL_INTERVAL {
            warn!(
                requested = ?interval,
                minimum = ?MIN_POLL_INTERVAL,
                "poll interval below service minimum, clamping"
            );
        }
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Sets the connect and buffered-read timeouts.
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Config {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Sets the reconnect backoff range.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Config {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Sets the fixed delay before reconnecting an established stream.
    pub fn with_stream_drop_delay(mut self, delay: Duration) -> Config {
        self.stream_drop_delay = delay;
        self
    }

    /// Sets the default readiness wait.
    pub fn with_start_wait(mut self, wait: Duration) -> Config {
        self.start_wait = wait;
        self
    }

    /// Requests evaluation reasons in targeted payloads.
    pub fn with_evaluation_reasons(mut self, on: bool) -> Config {
        self.evaluation_reasons = on;
        self
    }

    /// Uses REPORT requests for targeted polling.
    pub fn with_use_report(mut self, on: bool) -> Config {
        self.use_report = on;
        self
    }

    /// Sets the heartbeat probe flag key.
    pub fn with_heartbeat_key(mut self, key: impl Into<String>) -> Config {
        self.heartbeat_key = key.into();
        self
    }

    /// Puts the client in offline mode.
    pub fn with_offline(mut self, offline: bool) -> Config {
        self.offline = offline;
        self
    }

    /// Logs configuration problems that are worth flagging but not fatal.
    pub fn log_validation(&self) {
        if self.credential.is_empty() {
            warn!("credential is empty, requests will likely be rejected");
        }
        if self.dialect == Dialect::Targeted && self.context.is_none() {
            warn!("targeted dialect configured without an evaluation context");
        }
    }

    /// Full URI of the streaming endpoint.
    pub fn stream_request_uri(&self) -> String {
        match self.dialect {
            Dialect::Full => format!("{}{}", self.stream_uri, self.dialect.stream_path()),
            Dialect::Targeted => format!(
                "{}{}/{}",
                self.stream_uri,
                self.dialect.stream_path(),
                self.encoded_context()
            ),
        }
    }

    /// Request parts for a full poll of all data.
    pub fn poll_all_parts(&self) -> PollRequestParts {
        match self.dialect {
            Dialect::Full => {
                let uri = format!("{}/sdk/latest-all", self.base_uri);
                PollRequestParts {
                    method: Method::Get,
                    cache_uri: uri.clone(),
                    uri,
                    body: None,
                }
            }
            Dialect::Targeted => {
                let reasons = if self.evaluation_reasons {
                    "?withReasons=true"
                } else {
                    ""
                };
                let get_uri = format!(
                    "{}/msdk/evalx/contexts/{}{}",
                    self.base_uri,
                    self.encoded_context(),
                    reasons
                );
                if self.use_report {
                    PollRequestParts {
                        method: Method::Report,
                        uri: format!("{}/msdk/evalx/context{}", self.base_uri, reasons),
                        cache_uri: get_uri,
                        body: Some(self.context_body()),
                    }
                } else {
                    PollRequestParts {
                        method: Method::Get,
                        cache_uri: get_uri.clone(),
                        uri: get_uri,
                        body: None,
                    }
                }
            }
        }
    }

    /// URI for fetching one item by collection and key (full dialect).
    pub fn poll_one_uri(&self, sub_path: &str, key: &str) -> String {
        format!("{}{}/{}", self.base_uri, sub_path, key)
    }

    fn encoded_context(&self) -> String {
        let json = self
            .context
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_else(|| "{}".into());
        URL_SAFE.encode(json.as_bytes())
    }

    fn context_body(&self) -> Vec<u8> {
        self.context
            .as_ref()
            .map(|c| c.to_string().into_bytes())
            .unwrap_or_else(|| b"{}".to_vec())
    }
}

/// A poll request, shaped per dialect and transport mode.
///
/// `cache_uri` is the conditional-request cache key. In REPORT mode it
/// stays the GET-form URI so switching request modes does not orphan
/// cached payloads.
#[derive(Debug)]
pub struct PollRequestParts {
    /// Method to issue.
    pub method: Method,
    /// URI to request.
    pub uri: String,
    /// Key for the ETag cache.
    pub cache_uri: String,
    /// Body for REPORT requests.
    pub body: Option<Vec<u8>>,
}

fn trim_trailing_slash(uri: String) -> String {
    uri.trim_end_matches('/').to_string()
}
