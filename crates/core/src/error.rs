//! Error taxonomy for the document store emulation
//!
//! This module provides the canonical error type for all store and query
//! operations, plus the [`WireFailure`] shape that mirrors the real
//! service's exception surface (status code, sub-status placeholder, empty
//! activity id, zero request charge).
//!
//! ## Error Codes (Canonical)
//!
//! | Error | Status | Notes |
//! |-------|--------|-------|
//! | InvalidId | 400 | Fatal pre-check, never retried |
//! | BadUniqueKeyPolicy | 400 | Construction-time, fatal |
//! | QueryCapabilityRejected | 400 | Construction-time on the predicate |
//! | InvalidArgument | 400 | Bad caller input (negative clock advance, malformed body) |
//! | NotFound | 404 | Terminal for that id |
//! | AlreadyExists | 409 | Create over an existing id |
//! | UniqueConstraintViolation | 409 | Business rule, surfaced, not auto-retried |
//! | ConcurrencyMismatch | 412 | Expected; caller may re-read and retry |
//! | PreconditionRequired | 428 | Caller must supply a concurrency token |
//!
//! All failures are local and synchronous; there is no transient class
//! because no network call occurs.

use thiserror::Error;

/// All emulation errors.
///
/// This is the canonical error type for every store and query operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Document id contains a character the service does not escape in URIs.
    #[error(
        "document id '{0}' contains one of '/', '\\', '#', '?'; the service does not escape \
         these characters when addressing an item by id, encode the id to remove them"
    )]
    InvalidId(String),

    /// Create over an id that already exists in the partition.
    #[error("a document with id '{0}' already exists in this partition")]
    AlreadyExists(String),

    /// A unique-key rule matched another document in the partition.
    #[error("unique key constraint violated when writing document '{0}'")]
    UniqueConstraintViolation(String),

    /// Supplied concurrency token does not match the current version.
    #[error("concurrency token does not match the current version of the document")]
    ConcurrencyMismatch,

    /// The current version requires a token on its next update and none was supplied.
    #[error("a concurrency token must be provided to update document '{0}'")]
    PreconditionRequired(String),

    /// Document (or partition) not found.
    #[error("document '{0}' was not found")]
    NotFound(String),

    /// Unique-key policy references a system property.
    #[error("the unique key path cannot contain system properties; 'id' is a system property")]
    BadUniqueKeyPolicy,

    /// Predicate references a function the remote query engine does not support.
    #[error("{declaring}.{method} is not supported by the query engine")]
    QueryCapabilityRejected {
        /// Declaring type/namespace of the offending call.
        declaring: String,
        /// Method name of the offending call.
        method: String,
    },

    /// Bad caller input outside the taxonomy above.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for emulation operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// HTTP-compatible status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::InvalidId(_)
            | StoreError::BadUniqueKeyPolicy
            | StoreError::QueryCapabilityRejected { .. }
            | StoreError::InvalidArgument(_) => 400,
            StoreError::NotFound(_) => 404,
            StoreError::AlreadyExists(_) | StoreError::UniqueConstraintViolation(_) => 409,
            StoreError::ConcurrencyMismatch => 412,
            StoreError::PreconditionRequired(_) => 428,
        }
    }

    /// Check if this error is sensibly retried.
    ///
    /// Only a concurrency mismatch may succeed on retry with a re-read token.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::ConcurrencyMismatch)
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Check if this error is fatal at construction or pre-check time.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidId(_)
                | StoreError::BadUniqueKeyPolicy
                | StoreError::QueryCapabilityRejected { .. }
        )
    }

    /// Encode this error in the real service's exception shape.
    pub fn to_wire(&self) -> WireFailure {
        WireFailure {
            status_code: self.status_code(),
            sub_status_code: 0,
            activity_id: String::new(),
            request_charge: 0.0,
            message: self.to_string(),
        }
    }
}

/// Wire-compatible failure shape.
///
/// Mirrors the real service's exception surface so generic error-handling
/// code written against the live client also works against the emulation:
/// a status code, a sub-status placeholder, an empty correlation/activity
/// id, and a zero request charge.
#[derive(Debug, Clone, PartialEq)]
pub struct WireFailure {
    /// HTTP-compatible status code.
    pub status_code: u16,
    /// Sub-status placeholder (always zero in the emulation).
    pub sub_status_code: u32,
    /// Correlation id (always empty in the emulation).
    pub activity_id: String,
    /// Request charge (always zero; no throughput accounting).
    pub request_charge: f64,
    /// Human-readable diagnostic message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_service_taxonomy() {
        assert_eq!(StoreError::InvalidId("a/b".into()).status_code(), 400);
        assert_eq!(StoreError::BadUniqueKeyPolicy.status_code(), 400);
        assert_eq!(StoreError::NotFound("x".into()).status_code(), 404);
        assert_eq!(StoreError::AlreadyExists("x".into()).status_code(), 409);
        assert_eq!(
            StoreError::UniqueConstraintViolation("x".into()).status_code(),
            409
        );
        assert_eq!(StoreError::ConcurrencyMismatch.status_code(), 412);
        assert_eq!(
            StoreError::PreconditionRequired("x".into()).status_code(),
            428
        );
    }

    #[test]
    fn only_concurrency_mismatch_is_retryable() {
        assert!(StoreError::ConcurrencyMismatch.is_retryable());
        assert!(!StoreError::NotFound("x".into()).is_retryable());
        assert!(!StoreError::AlreadyExists("x".into()).is_retryable());
    }

    #[test]
    fn wire_shape_carries_placeholders() {
        let wire = StoreError::ConcurrencyMismatch.to_wire();
        assert_eq!(wire.status_code, 412);
        assert_eq!(wire.sub_status_code, 0);
        assert_eq!(wire.activity_id, "");
        assert_eq!(wire.request_charge, 0.0);
        assert!(!wire.message.is_empty());
    }
}
