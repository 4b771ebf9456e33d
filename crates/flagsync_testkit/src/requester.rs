//! Scripted HTTP requester.

use crate::chunks::{ScriptedChunkSource, StreamEnd};
use flagsync_engine::{
    ChunkSource, EngineError, EngineResult, HttpRequest, HttpResponse, Requester,
};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// One scripted outcome for a stream connection attempt.
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// The connection succeeds and delivers these chunks, then EOF.
    Events(Vec<Vec<u8>>),
    /// The connection succeeds, delivers these chunks, then drops with a
    /// transport error.
    EventsThenDrop(Vec<Vec<u8>>),
    /// The attempt fails with this HTTP status.
    Status(u16),
    /// The attempt fails below HTTP.
    Fail(String),
}

/// A [`Requester`] that replays scripted responses and records every
/// request it sees.
///
/// Stream attempts consume [`StreamScript`]s in order; buffered fetches
/// consume queued [`HttpResponse`]s. An exhausted queue answers with a
/// transport error, which the engine treats as recoverable, so a test
/// can let the worker idle in backoff until it is stopped.
#[derive(Default)]
pub struct MockRequester {
    streams: Mutex<VecDeque<StreamScript>>,
    fetches: Mutex<VecDeque<HttpResponse>>,
    stream_requests: Mutex<Vec<HttpRequest>>,
    fetch_requests: Mutex<Vec<HttpRequest>>,
}

impl MockRequester {
    /// Creates a requester with empty scripts.
    pub fn new() -> MockRequester {
        MockRequester::default()
    }

    /// Queues a stream connection outcome.
    pub fn push_stream(&self, script: StreamScript) {
        self.streams.lock().push_back(script);
    }

    /// Queues a buffered fetch response.
    pub fn push_fetch(&self, response: HttpResponse) {
        self.fetches.lock().push_back(response);
    }

    /// Every stream request seen, in order.
    pub fn stream_requests(&self) -> Vec<HttpRequest> {
        self.stream_requests.lock().clone()
    }

    /// Every buffered fetch request seen, in order.
    pub fn fetch_requests(&self) -> Vec<HttpRequest> {
        self.fetch_requests.lock().clone()
    }

    /// Number of stream connection attempts so far.
    pub fn stream_attempts(&self) -> usize {
        self.stream_requests.lock().len()
    }
}

impl Requester for MockRequester {
    fn fetch(&self, request: &HttpRequest) -> EngineResult<HttpResponse> {
        self.fetch_requests.lock().push(request.clone());
        self.fetches
            .lock()
            .pop_front()
            .ok_or_else(|| EngineError::Transport("no scripted fetch response".into()))
    }

    fn open_stream(&self, request: &HttpRequest) -> EngineResult<Box<dyn ChunkSource>> {
        self.stream_requests.lock().push(request.clone());
        match self.streams.lock().pop_front() {
            Some(StreamScript::Events(chunks)) => {
                Ok(Box::new(ScriptedChunkSource::new(chunks, StreamEnd::Eof)))
            }
            Some(StreamScript::EventsThenDrop(chunks)) => Ok(Box::new(ScriptedChunkSource::new(
                chunks,
                StreamEnd::Error("connection reset".into()),
            ))),
            Some(StreamScript::Status(status)) => Err(EngineError::HttpStatus { status }),
            Some(StreamScript::Fail(message)) => Err(EngineError::Transport(message)),
            None => Err(EngineError::Transport("no scripted stream".into())),
        }
    }
}
