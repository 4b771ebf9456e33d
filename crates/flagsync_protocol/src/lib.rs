//! # flagsync Protocol
//!
//! Wire protocol for the flagsync streaming client.
//!
//! This crate provides:
//! - The [`StreamEvent`] model for server-sent events
//! - [`FrameDecoder`]: chunked bytes in, whole parsed events out
//! - The exact wire payload shapes for `put`/`patch`/`delete`
//! - [`Dialect`]: the two protocol variants (full and targeted) behind
//!   one decoding capability
//!
//! The frame decoder is transport-agnostic: it consumes byte chunks of
//! any size and never yields a partial event. Connection management and
//! store application live in `flagsync_engine`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dialect;
mod error;
mod event;
mod frame;
mod payload;

pub use dialect::{Dialect, PatchTarget};
pub use error::{ProtocolError, ProtocolResult};
pub use event::StreamEvent;
pub use frame::FrameDecoder;
pub use payload::{AllCollections, DeletePayload, KeyedDelete, PatchPayload, PutEnvelope};
