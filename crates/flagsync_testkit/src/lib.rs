//! Test doubles and wire fixtures shared across the workspace.
//!
//! Nothing here is published; the crate exists so integration tests can
//! script a flag service down to the byte without a real socket.

mod chunks;
mod fixtures;
mod requester;

pub use chunks::{ScriptedChunkSource, StreamEnd};
pub use fixtures::{
    delete_frame, flag, full_put_body, full_put_frame, heartbeat_comment, json_response,
    patch_frame, segment, sse_frame, status_response, targeted_put_frame,
};
pub use requester::{MockRequester, StreamScript};
