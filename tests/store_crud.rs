//! CRUD behavior of the emulated container
//!
//! Covers the write-path contract: id restrictions, insert-vs-update
//! reporting, round-trips, and the not-found/already-exists edges.

use cosmock::prelude::*;
use serde_json::json;

fn container() -> Container {
    Container::builder("/pk").build().unwrap()
}

#[test]
fn create_then_read_round_trips_with_fresh_token() {
    let container = container();
    let pk = PartitionKey::from("tenant-1");
    let doc = json!({"id": "a", "pk": "tenant-1", "name": "first", "n": 7});

    let response = container.create(&doc, &pk).unwrap();
    assert!(!response.is_update);
    assert!(!response.document.token.as_str().is_empty());

    let read = container.read("a", &pk).unwrap();
    assert_eq!(read, doc);

    let record = container.read_document("a", &pk).unwrap();
    assert_eq!(record.token, response.document.token);
}

#[test]
fn create_over_existing_id_fails_already_exists() {
    let container = container();
    let pk = PartitionKey::from("p");
    container.create(&json!({"id": "a"}), &pk).unwrap();

    let err = container.create(&json!({"id": "a"}), &pk).unwrap_err();
    assert_eq!(err, StoreError::AlreadyExists("a".to_string()));
    assert_eq!(err.status_code(), 409);

    // The same id in another partition is fine.
    container
        .create(&json!({"id": "a"}), &PartitionKey::from("q"))
        .unwrap();
}

#[test]
fn invalid_ids_fail_on_every_write_path() {
    let container = container();
    let pk = PartitionKey::from("p");

    for id in ["a/b", "a\\b", "a#b", "a?b", "//", "a//b"] {
        let doc = json!({"id": id});
        assert!(matches!(
            container.create(&doc, &pk),
            Err(StoreError::InvalidId(_))
        ));
        assert!(matches!(
            container.upsert(&doc, &pk),
            Err(StoreError::InvalidId(_))
        ));
        assert!(matches!(
            container.replace(id, &doc, &pk),
            Err(StoreError::InvalidId(_)) | Err(StoreError::NotFound(_))
        ));
    }
    assert!(container.read("a/b", &pk).is_none());
}

#[test]
fn upsert_reports_update_and_regenerates_token() {
    let container = container();
    let pk = PartitionKey::from("p");

    let first = container.upsert(&json!({"id": "a", "v": 1}), &pk).unwrap();
    assert!(!first.is_update);

    let second = container.upsert(&json!({"id": "a", "v": 2}), &pk).unwrap();
    assert!(second.is_update);
    assert_ne!(first.document.token, second.document.token);
    assert_eq!(container.read("a", &pk).unwrap()["v"], 2);
}

#[test]
fn replace_requires_an_existing_document() {
    let container = container();
    let pk = PartitionKey::from("p");

    let err = container
        .replace("a", &json!({"id": "a"}), &pk)
        .unwrap_err();
    assert_eq!(err, StoreError::NotFound("a".to_string()));

    container.create(&json!({"id": "a", "v": 1}), &pk).unwrap();
    let response = container
        .replace("a", &json!({"id": "a", "v": 2}), &pk)
        .unwrap();
    assert!(response.is_update);
}

#[test]
fn delete_is_never_silently_idempotent() {
    let container = container();
    let pk = PartitionKey::from("p");

    let err = container.delete("a", &pk).unwrap_err();
    assert_eq!(err, StoreError::NotFound("a".to_string()));
    assert_eq!(err.status_code(), 404);

    container.create(&json!({"id": "a"}), &pk).unwrap();
    container.delete("a", &pk).unwrap();
    assert!(container.read("a", &pk).is_none());

    // Deleting again is NotFound, not a no-op.
    assert!(container.delete("a", &pk).unwrap_err().is_not_found());
}

#[test]
fn sentinel_partitions_hold_their_own_documents() {
    let container = container();
    container
        .upsert(&json!({"id": "a", "where": "none"}), &PartitionKey::None)
        .unwrap();
    container
        .upsert(&json!({"id": "a", "where": "null"}), &PartitionKey::Null)
        .unwrap();
    container
        .upsert(&json!({"id": "a", "where": "real"}), &PartitionKey::from("p"))
        .unwrap();

    assert_eq!(
        container.read("a", &PartitionKey::None).unwrap()["where"],
        "none"
    );
    assert_eq!(
        container.read("a", &PartitionKey::Null).unwrap()["where"],
        "null"
    );
    assert_eq!(
        container.read("a", &PartitionKey::from("p")).unwrap()["where"],
        "real"
    );
}

#[test]
fn wire_failures_match_the_service_exception_shape() {
    let container = container();
    let pk = PartitionKey::from("p");
    container.create(&json!({"id": "a"}), &pk).unwrap();

    let wire = container
        .create(&json!({"id": "a"}), &pk)
        .unwrap_err()
        .to_wire();
    assert_eq!(wire.status_code, 409);
    assert_eq!(wire.sub_status_code, 0);
    assert_eq!(wire.activity_id, "");
    assert_eq!(wire.request_charge, 0.0);
}

#[test]
fn partition_key_of_derives_from_the_declared_path() {
    let container = container();
    assert_eq!(
        container.partition_key_of(&json!({"id": "a", "pk": "tenant-1"})),
        PartitionKey::from("tenant-1")
    );
    assert_eq!(
        container.partition_key_of(&json!({"id": "a", "pk": null})),
        PartitionKey::Null
    );
    assert_eq!(
        container.partition_key_of(&json!({"id": "a"})),
        PartitionKey::None
    );
    // The raw string value is the key, escapes and all.
    assert_eq!(
        container.partition_key_of(&json!({"id": "a", "pk": "a\"b"})),
        PartitionKey::from("a\"b")
    );
}

#[test]
fn partition_key_of_agrees_with_the_stored_partition() {
    let container = Container::builder("/tenant/region").build().unwrap();
    let doc = json!({"id": "a", "tenant": {"region": "eu-west"}});

    let pk = container.partition_key_of(&doc);
    assert_eq!(pk, PartitionKey::from("eu-west"));

    container.create(&doc, &pk).unwrap();
    assert!(container.read("a", &pk).is_some());
}
