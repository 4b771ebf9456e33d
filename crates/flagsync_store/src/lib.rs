//! # flagsync Store
//!
//! Versioned in-memory storage for synchronized flag and segment data.
//!
//! This crate provides:
//! - Collection kinds (flags, segments) with their wire path conventions
//! - The versioned [`Item`] model with tombstone support
//! - The [`FeatureStore`] trait and the [`MemoryStore`] implementation
//! - Dependency ordering of full data sets before `init`
//!
//! ## Key Invariants
//!
//! - At most one item per key per kind
//! - Writes are gated by version: stale upserts and deletes are silent no-ops
//! - Deletes leave tombstones so out-of-order upserts stay rejected
//! - Readers never observe a partially applied `init`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod item;
mod kind;
mod memory;
mod sort;

pub use item::{DataSet, Item, ItemError};
pub use kind::DataKind;
pub use memory::{FeatureStore, MemoryStore};
pub use sort::sort_data_set;
