//! The parsed stream event model.

/// A single parsed server-sent event.
///
/// Constructed by [`crate::FrameDecoder`] from one delimited frame and
/// consumed exactly once by the update processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// Event id, when the server sent one. Used to resume after a drop.
    pub id: Option<String>,
    /// Event type tag; the wire default is `message`.
    pub event: String,
    /// Payload, with repeated `data:` lines newline-joined.
    pub data: String,
    /// Server-requested reconnect delay in milliseconds.
    pub retry: Option<u64>,
}

impl StreamEvent {
    /// Creates an event with the given type tag and payload.
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> StreamEvent {
        StreamEvent {
            id: None,
            event: event.into(),
            data: data.into(),
            retry: None,
        }
    }
}

impl Default for StreamEvent {
    fn default() -> StreamEvent {
        StreamEvent {
            id: None,
            event: "message".into(),
            data: String::new(),
            retry: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_event_tag_is_message() {
        let event = StreamEvent::default();
        assert_eq!(event.event, "message");
        assert!(event.data.is_empty());
        assert!(event.id.is_none());
        assert!(event.retry.is_none());
    }
}
