//! Document records
//!
//! A [`DocumentRecord`] is the stored form of a document: its id, the
//! serialized JSON body, the partition key it was written under, a
//! concurrency token that changes on every successful write, an optional
//! expiry tick, and two concurrency-simulation flags.
//!
//! Records are owned exclusively by the store; reads hand out clones, so
//! callers never hold aliases into store internals.

use crate::error::{Result, StoreError};
use crate::partition_key::PartitionKey;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Characters the real service does not escape when addressing an item by id.
pub const INVALID_ID_CHARS: [char; 4] = ['/', '\\', '#', '?'];

/// Reject ids containing any unescapable character.
///
/// Checked before anything else on every write path; a single occurrence
/// is rejected the same way as a doubled one.
pub fn validate_document_id(id: &str) -> Result<()> {
    if id.contains(&INVALID_ID_CHARS[..]) {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// An opaque concurrency token, regenerated on every successful write.
///
/// Rendered quoted, like an HTTP entity tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyToken(String);

impl ConcurrencyToken {
    /// Mint a fresh, globally unique token.
    pub fn mint() -> Self {
        ConcurrencyToken(format!("\"{}\"", Uuid::new_v4()))
    }

    /// The token as a string slice, for comparison against caller-supplied values.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConcurrencyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A versioned document as held by the store.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    /// Document id, unique within its partition.
    pub id: String,
    /// Serialized JSON body.
    pub body: String,
    /// Partition key the document was written under.
    pub partition_key: PartitionKey,
    /// Concurrency token of this version.
    pub token: ConcurrencyToken,
    /// Logical tick at which this document expires, if any.
    pub expiry_tick: Option<i64>,
    /// The next update must present a matching token.
    ///
    /// Persists across a successful update: it represents an external
    /// reader expected to retry with the latest version.
    pub require_token_on_next_update: bool,
    /// The next update is doomed to fail with a concurrency mismatch.
    pub scheduled_mismatch: bool,
}

impl DocumentRecord {
    /// Create a fresh version with a newly minted token and cleared flags.
    pub fn new(
        id: impl Into<String>,
        body: impl Into<String>,
        partition_key: PartitionKey,
        expiry_tick: Option<i64>,
    ) -> Self {
        DocumentRecord {
            id: id.into(),
            body: body.into(),
            partition_key,
            token: ConcurrencyToken::mint(),
            expiry_tick,
            require_token_on_next_update: false,
            scheduled_mismatch: false,
        }
    }

    /// Parse the body back into a JSON value.
    pub fn value(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.body)
            .map_err(|e| StoreError::InvalidArgument(format!("document body is not JSON: {e}")))
    }

    /// Deserialize the body into a caller type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            StoreError::InvalidArgument(format!("document body does not deserialize: {e}"))
        })
    }

    /// Mark this document so its next update forcibly fails with a
    /// concurrency mismatch, simulating a racing writer.
    ///
    /// Sets both flags: the doomed update also demands a token afterwards.
    pub fn schedule_concurrency_mismatch(&mut self) {
        self.require_token_on_next_update = true;
        self.scheduled_mismatch = true;
    }

    /// Flip the token and consume a scheduled mismatch.
    ///
    /// Called when the forced mismatch fires: the stored version moves on
    /// so the caller's stale token can never match again.
    pub fn flip_token(&mut self) {
        self.token = ConcurrencyToken::mint();
        self.scheduled_mismatch = false;
    }
}
