//! HTTP transport seam.
//!
//! The engine never talks to a socket directly. Everything network-shaped
//! goes through [`Requester`], so production code can plug in whichever
//! HTTP client it prefers and tests can script responses byte by byte.

use crate::config::Config;
use crate::error::EngineResult;
use bytes::Bytes;
use std::time::Duration;

/// HTTP methods the engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Plain GET.
    Get,
    /// REPORT with a JSON body, used to keep the evaluation context out
    /// of the URL.
    Report,
}

/// One outbound request, fully described.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute request URI.
    pub uri: String,
    /// Header name/value pairs, in send order.
    pub headers: Vec<(String, String)>,
    /// Optional request body (REPORT mode).
    pub body: Option<Vec<u8>>,
    /// Time allowed to establish the connection.
    pub connect_timeout: Duration,
    /// Time allowed between received bytes.
    pub read_timeout: Duration,
}

impl HttpRequest {
    /// Creates a GET request with default timeouts.
    pub fn get(uri: impl Into<String>) -> HttpRequest {
        HttpRequest {
            method: Method::Get,
            uri: uri.into(),
            headers: Vec::new(),
            body: None,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(15),
        }
    }

    /// Sets the method.
    pub fn with_method(mut self, method: Method) -> HttpRequest {
        self.method = method;
        self
    }

    /// Appends one header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> HttpRequest {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Appends a batch of headers.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> HttpRequest {
        self.headers.extend(headers);
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: Vec<u8>) -> HttpRequest {
        self.body = Some(body);
        self
    }

    /// Sets both timeouts.
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> HttpRequest {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// First value of the named header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Full response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First value of the named header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A live streaming response body, consumed chunk by chunk.
pub trait ChunkSource: Send {
    /// Returns the next chunk, `Ok(None)` on orderly end of stream, or an
    /// error when the connection drops.
    fn next_chunk(&mut self) -> EngineResult<Option<Bytes>>;
}

/// The engine's view of an HTTP client.
///
/// `fetch` returns the response for any status; status handling is the
/// caller's job. `open_stream` only yields a source for a successful
/// response, since there is nothing to stream otherwise; non-success
/// statuses surface as [`EngineError::HttpStatus`].
///
/// [`EngineError::HttpStatus`]: crate::error::EngineError::HttpStatus
pub trait Requester: Send + Sync {
    /// Issues a buffered request/response exchange.
    fn fetch(&self, request: &HttpRequest) -> EngineResult<HttpResponse>;

    /// Opens a long-lived streaming response.
    fn open_stream(&self, request: &HttpRequest) -> EngineResult<Box<dyn ChunkSource>>;
}

/// Headers common to every request: credential, client identification,
/// and the JSON content type.
pub fn base_headers(config: &Config) -> Vec<(String, String)> {
    vec![
        ("Authorization".into(), config.credential.clone()),
        ("User-Agent".into(), user_agent()),
        ("Content-Type".into(), "application/json".into()),
    ]
}

/// Base headers plus the streaming negotiation headers.
pub fn stream_headers(config: &Config) -> Vec<(String, String)> {
    let mut headers = base_headers(config);
    headers.push(("Accept".into(), "text/event-stream".into()));
    headers.push(("Cache-Control".into(), "no-cache".into()));
    headers
}

fn user_agent() -> String {
    format!("FlagSyncClient/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = HttpResponse {
            status: 200,
            headers: vec![("ETag".into(), "\"abc\"".into())],
            body: Vec::new(),
        };
        assert_eq!(response.header("etag"), Some("\"abc\""));
        assert_eq!(response.header("Etag"), Some("\"abc\""));
        assert_eq!(response.header("age"), None);
    }

    #[test]
    fn request_builder_accumulates() {
        let request = HttpRequest::get("https://sdk.example/all")
            .with_header("Authorization", "key")
            .with_headers(vec![("Accept".into(), "text/event-stream".into())])
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(2));
        assert_eq!(request.header("authorization"), Some("key"));
        assert_eq!(request.header("accept"), Some("text/event-stream"));
        assert_eq!(request.read_timeout, Duration::from_secs(2));
    }

    #[test]
    fn stream_headers_extend_base() {
        let config = Config::new("sdk-key");
        let headers = stream_headers(&config);
        let names: Vec<&str> = headers.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"Authorization"));
        assert!(names.contains(&"Accept"));
        assert!(names.contains(&"Cache-Control"));
    }
}
