//! Event frame decoding over an unbounded chunked byte stream.

use crate::event::StreamEvent;
use tracing::{debug, warn};

/// A frame ends at two consecutive line terminators. All three forms are
/// accepted; a given connection is expected to use one consistently.
const DELIMITERS: [&[u8]; 3] = [b"\r\n\r\n", b"\n\n", b"\r\r"];

/// Re-scan overlap so a delimiter straddling a chunk boundary is found.
/// Must be at least one byte shorter than the longest delimiter.
const SCAN_OVERLAP: usize = 3;

/// Incremental decoder turning raw byte chunks into [`StreamEvent`]s.
///
/// Chunks of any size (including empty) are appended with [`feed`];
/// [`next_event`] yields an event once a whole frame is buffered. After
/// each append only the unscanned tail of the buffer (plus a fixed
/// overlap) is searched for a frame delimiter, so per-chunk cost is
/// bounded by the chunk size rather than the buffer size.
///
/// Comment lines (empty field name) carry no data but signal liveness;
/// they are counted and drained via [`take_comment_count`] so the caller
/// can emit heartbeat telemetry.
///
/// [`feed`]: FrameDecoder::feed
/// [`next_event`]: FrameDecoder::next_event
/// [`take_comment_count`]: FrameDecoder::take_comment_count
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Bytes of `buf` already scanned without finding a delimiter.
    scanned: usize,
    comment_count: u64,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> FrameDecoder {
        FrameDecoder::default()
    }

    /// Appends one raw chunk from the transport.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Returns the next complete event, if a full frame is buffered.
    ///
    /// Frames containing only comments or unrecognized lines are skipped
    /// and never surface as events.
    pub fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            let (idx, len) = self.find_delimiter()?;
            let frame = String::from_utf8_lossy(&self.buf[..idx]).into_owned();
            self.buf.drain(..idx + len);
            self.scanned = 0;
            if let Some(event) = self.parse_frame(&frame) {
                return Some(event);
            }
        }
    }

    /// Comments observed since the last call. Resets the counter.
    pub fn take_comment_count(&mut self) -> u64 {
        std::mem::take(&mut self.comment_count)
    }

    /// Drops any unterminated trailing line.
    ///
    /// Called when the transport fails or ends mid-frame: the stream can
    /// only be resumed on whole-line boundaries, so content after the
    /// last line break is thrown away rather than glued to data from the
    /// next connection.
    pub fn discard_partial_line(&mut self) {
        if let Some(end) = self
            .buf
            .iter()
            .rposition(|b| *b == b'\n' || *b == b'\r')
        {
            self.buf.truncate(end + 1);
        } else {
            self.buf.clear();
        }
        self.scanned = self.scanned.min(self.buf.len());
    }

    /// True when bytes are buffered past the last complete frame.
    pub fn has_partial_frame(&self) -> bool {
        !self.buf.is_empty()
    }

    fn find_delimiter(&mut self) -> Option<(usize, usize)> {
        let start = self.scanned.saturating_sub(SCAN_OVERLAP);
        for i in start..self.buf.len() {
            for delim in DELIMITERS {
                if self.buf[i..].starts_with(delim) {
                    return Some((i, delim.len()));
                }
            }
        }
        self.scanned = self.buf.len();
        None
    }

    fn parse_frame(&mut self, frame: &str) -> Option<StreamEvent> {
        let mut event = StreamEvent::default();
        let mut saw_field = false;
        let mut data_lines: Vec<&str> = Vec::new();

        for line in split_lines(frame) {
            if line.is_empty() {
                continue;
            }
            let (name, value) = match line.find(':') {
                Some(i) => {
                    let value = &line[i + 1..];
                    (&line[..i], value.strip_prefix(' ').unwrap_or(value))
                }
                None => (line, ""),
            };
            match name {
                "" => {
                    // Comment line: liveness signal, no event content.
                    self.comment_count += 1;
                }
                "data" => {
                    data_lines.push(value);
                    saw_field = true;
                }
                "event" => {
                    event.event = value.to_string();
                    saw_field = true;
                }
                "id" => {
                    event.id = Some(value.to_string());
                    saw_field = true;
                }
                "retry" => match value.parse::<u64>() {
                    Ok(millis) => {
                        event.retry = Some(millis);
                        saw_field = true;
                    }
                    Err(_) => warn!(line, "dropping malformed retry field"),
                },
                other => debug!(field = other, "ignoring unknown stream field"),
            }
        }

        if !saw_field {
            return None;
        }
        event.data = data_lines.join("\n");
        Some(event)
    }
}

/// Splits frame content into lines, treating `\r\n`, `\n`, and `\r`
/// uniformly as single line breaks.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .flat_map(|chunk| chunk.split('\r'))
        .filter(|line| !line.is_empty())
}
