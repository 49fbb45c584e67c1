//! PartitionedStore: the emulated write path
//!
//! Documents are keyed by partition key, then id. The map shape mirrors a
//! sharded store: a `DashMap` of partitions for lock-free reads, with an
//! `FxHashMap` inside each partition for O(1) id lookups. All mutations
//! run under a single store-wide mutual-exclusion region, so there is one
//! writer at a time across the whole store; concurrent writers are
//! serialized, never rejected.
//!
//! ## Write Precedence
//!
//! Upserts apply checks in the order the real service does:
//! id validity → precondition requirement → forced mismatch → uniqueness
//! → token match. Tests comparing against the live service depend on this
//! ordering.
//!
//! ## Logical Time
//!
//! TTL eviction is driven by an integer clock advanced only through
//! [`PartitionedStore::advance_clock`], itself run under the writer
//! region so eviction stays consistent with concurrent writes.

use crate::notify::{ChangeObserver, Observers};
use crate::policy::UniqueKeyPolicy;
use cosmock_core::document::{validate_document_id, DocumentRecord};
use cosmock_core::error::{Result, StoreError};
use cosmock_core::fields;
use cosmock_core::partition_key::PartitionKey;
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, warn};

/// One partition: id → document.
type Partition = FxHashMap<String, DocumentRecord>;

/// Per-write options carried by the client surface.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Caller-supplied concurrency token for a conditional write.
    pub if_match: Option<String>,
}

impl WriteOptions {
    /// Options carrying a concurrency token.
    pub fn if_match(token: impl Into<String>) -> Self {
        WriteOptions {
            if_match: Some(token.into()),
        }
    }

    /// The supplied token, counting blank as absent.
    ///
    /// The precondition check treats whitespace-only tokens as missing;
    /// the mismatch comparison uses the raw value.
    fn non_blank_token(&self) -> Option<&str> {
        self.if_match
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Outcome of a successful write.
#[derive(Debug, Clone)]
pub struct WriteResponse {
    /// The stored version, including its fresh concurrency token.
    pub document: DocumentRecord,
    /// Whether the write replaced a prior version (vs. an insert).
    pub is_update: bool,
}

/// Partitioned in-memory document store.
///
/// # Examples
///
/// ```
/// use cosmock_store::{PartitionedStore, WriteOptions};
/// use cosmock_core::PartitionKey;
///
/// let store = PartitionedStore::new(None, -1).unwrap();
/// let pk = PartitionKey::from("tenant-1");
/// store
///     .upsert(r#"{"id": "a", "name": "first"}"#, &pk, &WriteOptions::default())
///     .unwrap();
/// assert!(store.get("a", &pk).is_some());
/// ```
pub struct PartitionedStore {
    /// Partition map; reads are lock-free, writes touch one shard.
    partitions: DashMap<PartitionKey, Partition>,
    /// Store-wide writer region. Mutations only ever block here.
    write_region: Mutex<()>,
    /// Monotonic logical clock, in ticks (seconds).
    clock: AtomicI64,
    policy: Option<UniqueKeyPolicy>,
    default_ttl: i64,
    observers: Observers,
}

impl PartitionedStore {
    /// Create a store with an optional unique-key policy and a default
    /// document time-to-live in logical seconds (negative = no default).
    ///
    /// A policy referencing the `id` system property fails immediately
    /// with [`StoreError::BadUniqueKeyPolicy`].
    pub fn new(policy: Option<UniqueKeyPolicy>, default_ttl_seconds: i64) -> Result<Self> {
        if let Some(policy) = &policy {
            policy.validate()?;
        }
        Ok(PartitionedStore {
            partitions: DashMap::new(),
            write_region: Mutex::new(()),
            clock: AtomicI64::new(0),
            policy,
            default_ttl: default_ttl_seconds,
            observers: Observers::new(),
        })
    }

    /// Current logical clock, in ticks.
    pub fn clock(&self) -> i64 {
        self.clock.load(Ordering::Acquire)
    }

    /// Register a change observer.
    ///
    /// Observers run after each committed write, in the writing caller's
    /// context, once the writer region has been released. They must not
    /// re-enter this store synchronously.
    pub fn subscribe(&self, observer: ChangeObserver) {
        self.observers.subscribe(observer);
    }

    // ========================================================================
    // Write path
    // ========================================================================

    /// Insert a new document; fails if the id already exists in the partition.
    pub fn create(
        &self,
        body: &str,
        partition_key: &PartitionKey,
        options: &WriteOptions,
    ) -> Result<WriteResponse> {
        let value = parse_body(body)?;
        let id = fields::id_of(&value)?;
        validate_document_id(&id)?;

        let response = {
            let _region = self.write_region.lock();
            let exists = self
                .partitions
                .get(partition_key)
                .is_some_and(|p| p.contains_key(&id));
            if exists {
                return Err(StoreError::AlreadyExists(id));
            }
            self.upsert_locked(body, &value, partition_key, options)?
        };
        self.observers.notify(&value);
        Ok(response)
    }

    /// Insert or update a document.
    pub fn upsert(
        &self,
        body: &str,
        partition_key: &PartitionKey,
        options: &WriteOptions,
    ) -> Result<WriteResponse> {
        let value = parse_body(body)?;
        let response = {
            let _region = self.write_region.lock();
            self.upsert_locked(body, &value, partition_key, options)?
        };
        self.observers.notify(&value);
        Ok(response)
    }

    /// Update an existing document; fails if the id is absent.
    pub fn replace(
        &self,
        id: &str,
        body: &str,
        partition_key: &PartitionKey,
        options: &WriteOptions,
    ) -> Result<WriteResponse> {
        let value = parse_body(body)?;
        let response = {
            let _region = self.write_region.lock();
            let exists = self
                .partitions
                .get(partition_key)
                .is_some_and(|p| p.contains_key(id));
            if !exists {
                return Err(StoreError::NotFound(id.to_string()));
            }
            self.upsert_locked(body, &value, partition_key, options)?
        };
        self.observers.notify(&value);
        Ok(response)
    }

    /// Delete a document; fails NotFound if absent, ConcurrencyMismatch if
    /// a supplied token does not match the current version.
    pub fn remove(
        &self,
        id: &str,
        partition_key: &PartitionKey,
        options: &WriteOptions,
    ) -> Result<()> {
        let _region = self.write_region.lock();
        let mut partition = self
            .partitions
            .get_mut(partition_key)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        {
            let current = partition
                .get(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            if let Some(supplied) = options.if_match.as_deref() {
                if supplied != current.token.as_str() {
                    return Err(StoreError::ConcurrencyMismatch);
                }
            }
        }
        partition.remove(id);
        debug!(%partition_key, id, "document removed");
        Ok(())
    }

    /// Upsert with the writer region already held.
    ///
    /// Check order matches observed service precedence: id validity →
    /// precondition requirement → forced mismatch → uniqueness → token
    /// match.
    fn upsert_locked(
        &self,
        body: &str,
        value: &Value,
        partition_key: &PartitionKey,
        options: &WriteOptions,
    ) -> Result<WriteResponse> {
        let id = fields::id_of(value)?;
        validate_document_id(&id)?;
        let ttl = fields::ttl_of(value, self.default_ttl);

        let mut partition = self.partitions.entry(partition_key.clone()).or_default();

        let mut existing_token = None;
        let mut carry_token_requirement = false;
        if let Some(existing) = partition.get_mut(&id) {
            carry_token_requirement = existing.require_token_on_next_update;
            if existing.require_token_on_next_update && options.non_blank_token().is_none() {
                return Err(StoreError::PreconditionRequired(id));
            }
            if existing.scheduled_mismatch {
                // Consume the scheduled mismatch: the stored version moves
                // on so the caller's stale token can never match again.
                existing.flip_token();
                return Err(StoreError::ConcurrencyMismatch);
            }
            existing_token = Some(existing.token.as_str().to_string());
        }
        let is_update = existing_token.is_some();

        if let Some(policy) = &self.policy {
            let others: Vec<Value> = partition
                .values()
                .filter(|doc| doc.id != id)
                .filter_map(|doc| doc.value().ok())
                .collect();
            if policy.is_violation(value, &others) {
                warn!(%partition_key, id = %id, "unique key constraint violated");
                return Err(StoreError::UniqueConstraintViolation(id));
            }
        }

        if let (Some(current), Some(supplied)) =
            (existing_token.as_deref(), options.if_match.as_deref())
        {
            if supplied != current {
                return Err(StoreError::ConcurrencyMismatch);
            }
        }

        let expiry_tick = expiry_for(ttl, self.clock.load(Ordering::Acquire));
        let mut record = DocumentRecord::new(&id, body, partition_key.clone(), expiry_tick);
        record.require_token_on_next_update = carry_token_requirement;
        partition.insert(id.clone(), record.clone());

        debug!(%partition_key, id = %id, is_update, ?expiry_tick, "document written");
        Ok(WriteResponse {
            document: record,
            is_update,
        })
    }

    // ========================================================================
    // Read path (lock-free)
    // ========================================================================

    /// Read a document by id and partition key.
    ///
    /// Returns a clone safe to inspect across later mutations. A read
    /// racing a write observes either the prior or the new version.
    pub fn get(&self, id: &str, partition_key: &PartitionKey) -> Option<DocumentRecord> {
        self.partitions
            .get(partition_key)
            .and_then(|partition| partition.get(id).cloned())
    }

    /// All documents in a partition, or across every partition when no
    /// key is supplied (a missing key means a cross-partition scan, as in
    /// the real client).
    pub fn items_in_partition(&self, partition_key: Option<&PartitionKey>) -> Vec<DocumentRecord> {
        match partition_key {
            Some(pk) => self
                .partitions
                .get(pk)
                .map(|partition| partition.values().cloned().collect())
                .unwrap_or_default(),
            None => self
                .partitions
                .iter()
                .flat_map(|partition| partition.values().cloned().collect::<Vec<_>>())
                .collect(),
        }
    }

    /// Total number of live documents across all partitions.
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.len()).sum()
    }

    /// Whether the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    // Test controls (absent from the real service)
    // ========================================================================

    /// Mark a document so its next update forcibly fails with a
    /// concurrency mismatch, simulating a racing writer.
    pub fn schedule_concurrency_mismatch(
        &self,
        id: &str,
        partition_key: &PartitionKey,
    ) -> Result<()> {
        let _region = self.write_region.lock();
        let mut partition = self
            .partitions
            .get_mut(partition_key)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let document = partition
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        document.schedule_concurrency_mismatch();
        Ok(())
    }

    /// Advance the logical clock and evict every expired document.
    pub fn advance_clock(&self, ticks: i64) -> Result<()> {
        if ticks < 0 {
            return Err(StoreError::InvalidArgument(
                "ticks must be a positive value".to_string(),
            ));
        }
        let _region = self.write_region.lock();
        let now = self.clock.fetch_add(ticks, Ordering::AcqRel) + ticks;
        for mut partition in self.partitions.iter_mut() {
            partition.retain(|_, doc| doc.expiry_tick.map_or(true, |expiry| now < expiry));
        }
        debug!(now, "clock advanced");
        Ok(())
    }

    /// Remove all documents and reset the clock to zero.
    pub fn clear(&self) {
        let _region = self.write_region.lock();
        self.partitions.clear();
        self.clock.store(0, Ordering::Release);
    }
}

impl std::fmt::Debug for PartitionedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedStore")
            .field("partitions", &self.partitions.len())
            .field("documents", &self.len())
            .field("clock", &self.clock())
            .finish()
    }
}

fn parse_body(body: &str) -> Result<Value> {
    serde_json::from_str(body)
        .map_err(|e| StoreError::InvalidArgument(format!("document body is not JSON: {e}")))
}

fn expiry_for(ttl: i64, now: i64) -> Option<i64> {
    if ttl < 0 {
        None
    } else {
        Some(now + ttl)
    }
}
