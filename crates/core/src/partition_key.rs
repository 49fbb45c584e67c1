//! Partition-key values
//!
//! A partition key is either an explicit value or one of two sentinels:
//! "no key supplied" and "explicit null key". The sentinels are distinct
//! from every explicit value by construction, so the enum itself is the
//! normalized map key; no reserved in-band magic strings are needed.

use serde::{Deserialize, Serialize};

/// A partition-key value sharding documents within the store.
///
/// # Examples
///
/// ```
/// use cosmock_core::PartitionKey;
///
/// let pk = PartitionKey::from("tenant-1");
/// assert_ne!(pk, PartitionKey::None);
/// assert_ne!(PartitionKey::None, PartitionKey::Null);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionKey {
    /// An explicit partition-key value.
    Explicit(String),
    /// No partition key was supplied.
    None,
    /// An explicit null partition key.
    Null,
}

impl PartitionKey {
    /// The explicit value, if this key carries one.
    pub fn value(&self) -> Option<&str> {
        match self {
            PartitionKey::Explicit(v) => Some(v),
            PartitionKey::None | PartitionKey::Null => None,
        }
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        PartitionKey::Explicit(value.to_string())
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        PartitionKey::Explicit(value)
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionKey::Explicit(v) => write!(f, "{v}"),
            PartitionKey::None => write!(f, "<none>"),
            PartitionKey::Null => write!(f, "<null>"),
        }
    }
}
