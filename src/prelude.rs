//! Convenience re-exports for the common case.
//!
//! ```
//! use cosmock::prelude::*;
//! ```

pub use crate::container::{Container, ContainerBuilder};
pub use cosmock_core::{PartitionKey, Result, StoreError};
pub use cosmock_query::Expr;
pub use cosmock_store::{UniqueKey, UniqueKeyPolicy, WriteOptions, WriteResponse};
