//! Partitioned in-memory document store
//!
//! This crate implements the write path of the emulation:
//! - [`PartitionedStore`]: documents keyed by partition key then id, with
//!   id validation, unique-key enforcement, optimistic concurrency, and
//!   TTL eviction driven by a manual logical clock
//! - [`UniqueKeyPolicy`]: partition-scoped uniqueness rules
//! - change notifications delivered after each committed write
//!
//! ## Concurrency Model
//!
//! - Writes: one store-wide mutual-exclusion region; concurrent writers
//!   are serialized, never rejected
//! - Reads: lock-free snapshots against the underlying map; a racing read
//!   observes either the prior or the new version, never a torn one
//! - Notifications: fire after the region is released, synchronously in
//!   the writing caller's context; subscribers must not re-enter the
//!   store synchronously

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod notify;
pub mod policy;
pub mod store;

pub use notify::ChangeObserver;
pub use policy::{UniqueKey, UniqueKeyPolicy};
pub use store::{PartitionedStore, WriteOptions, WriteResponse};
