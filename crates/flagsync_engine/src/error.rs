//! Engine error types and retry classification.

use flagsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by transports, fetchers, and the update processors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The service answered with a non-success HTTP status.
    #[error("HTTP error {status}{}", recoverable_suffix(.status))]
    HttpStatus {
        /// The status code from the response.
        status: u16,
    },

    /// The connection failed below the HTTP layer (DNS, TCP, TLS, read
    /// timeout). Always worth retrying.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A stream payload could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A 304 arrived for a URI we have never cached. Treated as a failed
    /// poll cycle rather than an empty data set.
    #[error("not-modified response with no cached payload")]
    NotModifiedWithoutCache,

    /// The operation is not available in the configured dialect.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The processor was asked to stop while the operation was in flight.
    #[error("processor stopped")]
    Stopped,
}

impl EngineError {
    /// Whether the connection loop should keep retrying after this error.
    ///
    /// Message-level errors (protocol decoding) never tear the loop down,
    /// so they classify as recoverable here; the loop only sees them when
    /// it chooses to propagate.
    pub fn is_recoverable(&self) -> bool {
        match self {
            EngineError::HttpStatus { status } => is_http_error_recoverable(*status),
            EngineError::Stopped => false,
            _ => true,
        }
    }
}

/// Status codes that warrant a retry.
///
/// Server-side trouble (5xx) and throttling (429) are transient. 400 and
/// 408 are included because some proxies emit them for requests that were
/// torn down mid-flight. Everything else in the 4xx range means the
/// request itself is bad (credentials, endpoint) and will not get better
/// by retrying.
pub fn is_http_error_recoverable(status: u16) -> bool {
    if status >= 500 {
        return true;
    }
    matches!(status, 400 | 408 | 429)
}

fn recoverable_suffix(status: &u16) -> &'static str {
    if is_http_error_recoverable(*status) {
        " (will retry)"
    } else {
        " (giving up permanently)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_status_table() {
        for status in [400, 408, 429, 500, 503, 599] {
            assert!(is_http_error_recoverable(status), "{status}");
        }
        for status in [401, 403, 404, 409, 499] {
            assert!(!is_http_error_recoverable(status), "{status}");
        }
    }

    #[test]
    fn error_recoverability() {
        assert!(EngineError::HttpStatus { status: 503 }.is_recoverable());
        assert!(!EngineError::HttpStatus { status: 401 }.is_recoverable());
        assert!(EngineError::Transport("reset".into()).is_recoverable());
        assert!(!EngineError::Stopped.is_recoverable());
    }

    #[test]
    fn status_messages_state_the_outcome() {
        let retry = EngineError::HttpStatus { status: 503 }.to_string();
        assert!(retry.contains("will retry"), "{retry}");
        let fatal = EngineError::HttpStatus { status: 401 }.to_string();
        assert!(fatal.contains("giving up"), "{fatal}");
    }
}
