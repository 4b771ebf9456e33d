//! Error types for wire protocol decoding.

use thiserror::Error;

/// Result type for protocol decoding.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding stream payloads.
///
/// All of these are message-level: the engine logs and drops the
/// offending event, the connection stays up.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The payload was not valid JSON of the expected shape.
    #[error("malformed event payload: {0}")]
    Json(#[from] serde_json::Error),

    /// An item in the payload was structurally unusable.
    #[error(transparent)]
    Item(#[from] flagsync_store::ItemError),

    /// A patch/delete path matched no known collection prefix.
    #[error("path matches no known collection: {0}")]
    UnknownPath(String),

    /// The event tag is not part of the active dialect.
    #[error("event `{event}` is not supported by the {dialect} dialect")]
    UnsupportedEvent {
        /// The active dialect name.
        dialect: &'static str,
        /// The offending event tag.
        event: String,
    },
}

impl ProtocolError {
    /// True when the message was dropped because its path was unresolvable
    /// (as opposed to being structurally malformed).
    pub fn is_unknown_path(&self) -> bool {
        matches!(self, ProtocolError::UnknownPath(_))
    }
}
