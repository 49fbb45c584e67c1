//! # Cosmock
//!
//! In-memory emulation of a partitioned document database, built so
//! application tests can run without a live database connection.
//!
//! The emulation reproduces the real service's subtle write-path
//! behaviors: id character restrictions, partition-scoped unique-key
//! constraints, the optimistic-concurrency token protocol, TTL expiry
//! driven by a manual logical clock, and the exact subset of query
//! operators the remote engine supports.
//!
//! ## Quick Start
//!
//! ```
//! use cosmock::prelude::*;
//! use serde_json::json;
//!
//! # fn main() -> cosmock::Result<()> {
//! let container = Container::builder("/pk").build()?;
//! let pk = PartitionKey::from("tenant-1");
//!
//! container.create(&json!({"id": "a", "pk": "tenant-1", "name": "first"}), &pk)?;
//! let doc = container.read("a", &pk).expect("document present");
//! assert_eq!(doc["name"], "first");
//!
//! // Queries validate capability before any document is scanned.
//! let matched = container.query(
//!     Some(&pk),
//!     &Expr::eq(Expr::field("name"), Expr::constant(json!("first"))),
//! )?;
//! assert_eq!(matched.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Test Controls
//!
//! Two operations exist only in the emulation, never in the real
//! service: [`Container::advance_clock`] drives TTL expiry without real
//! delay, and [`Container::schedule_concurrency_mismatch`] makes the next
//! update of a document fail as if a racing writer got there first.

#![warn(missing_docs)]

mod container;

pub mod prelude;

pub use container::{Container, ContainerBuilder};

// Re-export the core vocabulary so callers rarely need the member crates.
pub use cosmock_core::{
    ConcurrencyToken, DocumentRecord, PartitionKey, Result, StoreError, WireFailure,
};
pub use cosmock_query::{BinaryOp, CallTarget, Expr, QueryCapabilityValidator, TypeTag, UnaryOp};
pub use cosmock_store::{
    ChangeObserver, PartitionedStore, UniqueKey, UniqueKeyPolicy, WriteOptions, WriteResponse,
};
