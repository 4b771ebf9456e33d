//! Scripted stream bodies.

use bytes::Bytes;
use flagsync_engine::{ChunkSource, EngineError, EngineResult};
use std::collections::VecDeque;

/// How a scripted stream finishes once its chunks run out.
#[derive(Debug, Clone)]
pub enum StreamEnd {
    /// Orderly end of body.
    Eof,
    /// Connection drop with the given transport error message.
    Error(String),
}

/// A [`ChunkSource`] that replays a fixed chunk sequence.
pub struct ScriptedChunkSource {
    chunks: VecDeque<Bytes>,
    end: Option<StreamEnd>,
}

impl ScriptedChunkSource {
    /// Replays `chunks` then finishes with `end`.
    pub fn new(chunks: Vec<Vec<u8>>, end: StreamEnd) -> ScriptedChunkSource {
        ScriptedChunkSource {
            chunks: chunks.into_iter().map(Bytes::from).collect(),
            end: Some(end),
        }
    }

    /// The whole text as a single chunk, then EOF.
    pub fn from_text(text: &str) -> ScriptedChunkSource {
        ScriptedChunkSource::new(vec![text.as_bytes().to_vec()], StreamEnd::Eof)
    }

    /// The text split into `size`-byte chunks, then EOF. Exercises frame
    /// reassembly across arbitrary boundaries.
    pub fn split_every(text: &str, size: usize) -> ScriptedChunkSource {
        let chunks = text
            .as_bytes()
            .chunks(size.max(1))
            .map(|c| c.to_vec())
            .collect();
        ScriptedChunkSource::new(chunks, StreamEnd::Eof)
    }
}

impl ChunkSource for ScriptedChunkSource {
    fn next_chunk(&mut self) -> EngineResult<Option<Bytes>> {
        if let Some(chunk) = self.chunks.pop_front() {
            return Ok(Some(chunk));
        }
        match self.end.take() {
            Some(StreamEnd::Error(message)) => Err(EngineError::Transport(message)),
            _ => Ok(None),
        }
    }
}
