//! Container facade
//!
//! [`Container`] ties the write path and the query path together behind
//! the boundary the client-surface adapter consumes: document CRUD, query
//! execution with capability validation, and the two test-control
//! operations (clock advance, scheduled concurrency mismatch).

use cosmock_core::error::Result;
use cosmock_core::{DocumentRecord, PartitionKey};
use cosmock_query::{eval, Expr, QueryCapabilityValidator};
use cosmock_store::{
    ChangeObserver, PartitionedStore, UniqueKeyPolicy, WriteOptions, WriteResponse,
};
use serde_json::Value;

/// Builder for [`Container`].
///
/// # Examples
///
/// ```
/// use cosmock::prelude::*;
///
/// let container = Container::builder("/pk")
///     .unique_key_policy(UniqueKeyPolicy::new(vec![UniqueKey::new(["/CustomerId"])]))
///     .default_ttl(-1)
///     .build()
///     .unwrap();
/// # let _ = container;
/// ```
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    partition_key_path: String,
    policy: Option<UniqueKeyPolicy>,
    default_ttl: i64,
}

impl ContainerBuilder {
    /// Attach a unique-key policy.
    ///
    /// A policy referencing the `id` system property fails `build` with a
    /// 400-shaped error.
    pub fn unique_key_policy(mut self, policy: UniqueKeyPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Default document time-to-live in logical seconds; negative means
    /// documents never expire unless they carry their own `ttl`.
    pub fn default_ttl(mut self, seconds: i64) -> Self {
        self.default_ttl = seconds;
        self
    }

    /// Build the container.
    pub fn build(self) -> Result<Container> {
        Ok(Container {
            store: PartitionedStore::new(self.policy, self.default_ttl)?,
            partition_key_path: self.partition_key_path,
        })
    }
}

/// An emulated document container.
pub struct Container {
    store: PartitionedStore,
    partition_key_path: String,
}

impl Container {
    /// Start building a container for documents sharded at
    /// `partition_key_path` (`/`-prefixed, as the service declares it).
    pub fn builder(partition_key_path: impl Into<String>) -> ContainerBuilder {
        ContainerBuilder {
            partition_key_path: partition_key_path.into(),
            policy: None,
            default_ttl: -1,
        }
    }

    /// The path documents are sharded on.
    pub fn partition_key_path(&self) -> &str {
        &self.partition_key_path
    }

    /// Derive the partition key a document would be stored under.
    ///
    /// A missing value at the path means "no key supplied"; an explicit
    /// JSON null maps to the null-key sentinel.
    pub fn partition_key_of(&self, doc: &Value) -> PartitionKey {
        let pointer = if self.partition_key_path.starts_with('/') {
            self.partition_key_path.clone()
        } else {
            format!("/{}", self.partition_key_path)
        };
        match doc.pointer(&pointer) {
            None => PartitionKey::None,
            Some(Value::Null) => PartitionKey::Null,
            Some(Value::String(s)) => PartitionKey::Explicit(s.clone()),
            Some(other) => PartitionKey::Explicit(other.to_string()),
        }
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    /// Insert a new document.
    pub fn create(&self, doc: &Value, partition_key: &PartitionKey) -> Result<WriteResponse> {
        self.create_with(doc, partition_key, &WriteOptions::default())
    }

    /// Insert a new document with explicit write options.
    pub fn create_with(
        &self,
        doc: &Value,
        partition_key: &PartitionKey,
        options: &WriteOptions,
    ) -> Result<WriteResponse> {
        self.store.create(&doc.to_string(), partition_key, options)
    }

    /// Insert or update a document.
    pub fn upsert(&self, doc: &Value, partition_key: &PartitionKey) -> Result<WriteResponse> {
        self.upsert_with(doc, partition_key, &WriteOptions::default())
    }

    /// Insert or update a document with explicit write options.
    pub fn upsert_with(
        &self,
        doc: &Value,
        partition_key: &PartitionKey,
        options: &WriteOptions,
    ) -> Result<WriteResponse> {
        self.store.upsert(&doc.to_string(), partition_key, options)
    }

    /// Update an existing document.
    pub fn replace(
        &self,
        id: &str,
        doc: &Value,
        partition_key: &PartitionKey,
    ) -> Result<WriteResponse> {
        self.replace_with(id, doc, partition_key, &WriteOptions::default())
    }

    /// Update an existing document with explicit write options.
    pub fn replace_with(
        &self,
        id: &str,
        doc: &Value,
        partition_key: &PartitionKey,
        options: &WriteOptions,
    ) -> Result<WriteResponse> {
        self.store
            .replace(id, &doc.to_string(), partition_key, options)
    }

    /// Delete a document.
    pub fn delete(&self, id: &str, partition_key: &PartitionKey) -> Result<()> {
        self.delete_with(id, partition_key, &WriteOptions::default())
    }

    /// Delete a document with explicit write options.
    pub fn delete_with(
        &self,
        id: &str,
        partition_key: &PartitionKey,
        options: &WriteOptions,
    ) -> Result<()> {
        self.store.remove(id, partition_key, options)
    }

    /// Read a document's JSON value, or `None` if absent.
    pub fn read(&self, id: &str, partition_key: &PartitionKey) -> Option<Value> {
        self.read_document(id, partition_key)
            .and_then(|doc| doc.value().ok())
    }

    /// Read the full stored record, token and expiry included.
    pub fn read_document(&self, id: &str, partition_key: &PartitionKey) -> Option<DocumentRecord> {
        self.store.get(id, partition_key)
    }

    // ========================================================================
    // Query
    // ========================================================================

    /// Run a predicate over a partition, or across every partition when
    /// no key is supplied.
    ///
    /// The predicate passes through [`QueryCapabilityValidator`] first:
    /// an unsupported call fails before any document is scanned.
    pub fn query(
        &self,
        partition_key: Option<&PartitionKey>,
        predicate: &Expr,
    ) -> Result<Vec<Value>> {
        let rewritten = QueryCapabilityValidator::validate(predicate)?;

        let mut matched = Vec::new();
        for record in self.store.items_in_partition(partition_key) {
            let doc = record.value()?;
            if eval::matches(&doc, &rewritten)? {
                matched.push(doc);
            }
        }
        Ok(matched)
    }

    // ========================================================================
    // Test controls (absent from the real service)
    // ========================================================================

    /// Advance the logical clock, evicting expired documents.
    pub fn advance_clock(&self, seconds: i64) -> Result<()> {
        self.store.advance_clock(seconds)
    }

    /// Remove all documents and reset the clock to zero.
    pub fn clear(&self) {
        self.store.clear()
    }

    /// Make the next update of a document fail with a concurrency
    /// mismatch, simulating a racing writer.
    pub fn schedule_concurrency_mismatch(
        &self,
        id: &str,
        partition_key: &PartitionKey,
    ) -> Result<()> {
        self.store.schedule_concurrency_mismatch(id, partition_key)
    }

    /// Register a change observer; it sees the deserialized document of
    /// every committed write, after the writer region is released.
    pub fn subscribe(&self, observer: ChangeObserver) {
        self.store.subscribe(observer);
    }

    /// Direct access to the underlying store, for harnesses that compare
    /// against the real service.
    pub fn store(&self) -> &PartitionedStore {
        &self.store
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("partition_key_path", &self.partition_key_path)
            .field("store", &self.store)
            .finish()
    }
}
