//! Core types for the partitioned document store emulation
//!
//! This crate defines the fundamental types shared by the store and query
//! layers:
//! - [`StoreError`]: the canonical error taxonomy with wire-compatible shapes
//! - [`PartitionKey`]: tagged partition-key values including the None/Null sentinels
//! - [`DocumentRecord`]: a versioned document with a concurrency token
//! - [`fields`]: JSON field-path helpers (id, ttl, unique-key value sets)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod fields;
pub mod partition_key;

pub use document::{validate_document_id, ConcurrencyToken, DocumentRecord};
pub use error::{Result, StoreError, WireFailure};
pub use partition_key::PartitionKey;
