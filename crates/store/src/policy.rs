//! Unique-key policy
//!
//! A policy is zero or more rules; each rule names an ordered set of field
//! paths whose combined value set must be unique per partition among
//! documents other than the one being written. The `id` system property
//! may not appear in any rule; that fails construction immediately.

use cosmock_core::error::{Result, StoreError};
use cosmock_core::fields;
use serde_json::Value;
use std::collections::BTreeSet;

/// One uniqueness rule: an ordered set of field paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    /// Field paths, `/`-separated with an optional leading slash.
    pub paths: Vec<String>,
}

impl UniqueKey {
    /// Build a rule from path strings.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        UniqueKey {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// The value set this rule computes for a document.
    pub fn value_set(&self, doc: &Value) -> BTreeSet<String> {
        fields::value_set_at(doc, &self.paths)
    }
}

/// A partition-scoped uniqueness policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueKeyPolicy {
    /// The rules, checked independently; any violated rule rejects a write.
    pub unique_keys: Vec<UniqueKey>,
}

impl UniqueKeyPolicy {
    /// Build a policy from rules.
    pub fn new(unique_keys: Vec<UniqueKey>) -> Self {
        UniqueKeyPolicy { unique_keys }
    }

    /// Reject policies that reference the `id` system property.
    ///
    /// Run at store construction, before any document is accepted.
    pub fn validate(&self) -> Result<()> {
        let touches_id = self
            .unique_keys
            .iter()
            .flat_map(|key| key.paths.iter())
            .any(|path| fields::normalize_path(path) == "id");
        if touches_id {
            return Err(StoreError::BadUniqueKeyPolicy);
        }
        Ok(())
    }

    /// Whether `candidate` collides with any of `others` under any rule.
    ///
    /// Comparison is set-equality of the values computed at each rule's
    /// paths; the caller is responsible for excluding the document being
    /// replaced from `others`.
    pub fn is_violation<'a, I>(&self, candidate: &Value, others: I) -> bool
    where
        I: IntoIterator<Item = &'a Value>,
    {
        if self.unique_keys.is_empty() {
            return false;
        }
        let others: Vec<&Value> = others.into_iter().collect();
        for rule in &self.unique_keys {
            let candidate_set = rule.value_set(candidate);
            if others
                .iter()
                .any(|other| rule.value_set(other) == candidate_set)
            {
                return true;
            }
        }
        false
    }
}
