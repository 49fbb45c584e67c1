//! JSON field-path helpers
//!
//! The store keeps documents as serialized JSON and reaches into them for
//! three things: the system `id` property, the per-document `ttl` field,
//! and the value sets named by unique-key rules.
//!
//! Unique-key paths use `/`-separated segments with an optional leading
//! slash (`/CustomerId`, `/address/city`). A segment crossing an array
//! fans out over its elements, so one path can contribute several values
//! to a rule's set.

use crate::error::{Result, StoreError};
use serde_json::Value;
use std::collections::BTreeSet;

/// Extract the system `id` property from a document body.
///
/// The id must be present and a string; anything else is a caller error.
pub fn id_of(doc: &Value) -> Result<String> {
    match doc.get("id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(other) => Err(StoreError::InvalidArgument(format!(
            "document 'id' must be a string, got {other}"
        ))),
        None => Err(StoreError::InvalidArgument(
            "document has no 'id' property".to_string(),
        )),
    }
}

/// Time-to-live in logical seconds for a document body.
///
/// The document's own `ttl` field wins; otherwise the store default
/// applies. Negative means "never expires" either way.
pub fn ttl_of(doc: &Value, default_ttl: i64) -> i64 {
    match doc.get("ttl").and_then(Value::as_i64) {
        Some(ttl) => ttl,
        None => default_ttl,
    }
}

/// The set of values found at `paths` in a document, canonicalized.
///
/// Values are canonicalized to their serialized form so that objects and
/// arrays compare structurally. Missing paths contribute nothing: two
/// documents lacking every path of a rule produce equal empty sets and
/// therefore collide under that rule, matching the real service.
pub fn value_set_at(doc: &Value, paths: &[String]) -> BTreeSet<String> {
    let mut set = BTreeSet::new();
    for path in paths {
        let mut hits = Vec::new();
        collect_at_path(doc, normalize_path(path), &mut hits);
        for hit in hits {
            set.insert(hit.to_string());
        }
    }
    set
}

/// Strip the leading separator a unique-key path conventionally carries.
pub fn normalize_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

fn collect_at_path<'a>(value: &'a Value, path: &str, out: &mut Vec<&'a Value>) {
    if path.is_empty() {
        out.push(value);
        return;
    }
    let (segment, rest) = match path.split_once('/') {
        Some((seg, rest)) => (seg, rest),
        None => (path, ""),
    };
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(segment) {
                collect_at_path(child, rest, out);
            }
        }
        // Arrays fan out: the path applies to each element.
        Value::Array(items) => {
            for item in items {
                collect_at_path(item, path, out);
            }
        }
        _ => {}
    }
}
