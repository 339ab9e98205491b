//! Identifier-mapping and allow-list behavior through the public API
//!
//! None of these tests need a running server.

use mongostore::bson::{doc, oid::ObjectId, Bson};
use mongostore::{Record, Store, StoreError, StoreOptions};

fn options() -> StoreOptions {
    StoreOptions::new("app")
        .with_hosts(["127.0.0.1:1"])
        .with_auto_id(true)
        .with_id_field("id")
        .with_timestamp_field("created")
}

// ============================================================================
// Identifier mapping
// ============================================================================

#[test]
fn test_stored_document_becomes_public_record() {
    let mapping = options().id_mapping();
    let oid = ObjectId::new();

    let public = mapping.map_output(doc! { "_id": oid, "name": "alice" });
    let record = Record::from_document(public, false);

    assert_eq!(record.get_str("id"), Some(oid.to_hex().as_str()));
    assert!(!record.contains_key("_id"));
    assert!(record.contains_key("created"));
}

#[test]
fn test_public_record_written_back_targets_same_id() {
    let mapping = options().id_mapping();
    let oid = ObjectId::new();

    let mut edited = mapping.map_output(doc! { "_id": oid, "name": "alice" });
    edited.insert("name", "alice cooper");
    mapping.map_input(&mut edited);

    assert_eq!(edited, doc! { "name": "alice cooper", "_id": oid });
}

#[test]
fn test_filter_by_public_id() {
    let mapping = options().id_mapping();
    let mut filter = doc! { "id": "507f1f77bcf86cd799439011", "active": true };
    mapping.map_input(&mut filter);

    assert_eq!(
        filter.get("_id"),
        Some(&Bson::ObjectId(ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap()))
    );
    assert!(filter.get_bool("active").unwrap());
}

#[test]
fn test_auto_id_off_passes_documents_through() {
    let mapping = StoreOptions::new("app").with_id_field("id").id_mapping();
    let stored = doc! { "_id": ObjectId::new(), "name": "alice" };
    assert_eq!(mapping.map_output(stored.clone()), stored);
}

#[test]
fn test_object_records_are_plain_json() {
    let mapping = options().id_mapping();
    let oid = ObjectId::new();
    let public = mapping.map_output(doc! { "_id": oid, "tags": ["a", "b"] });

    let json = Record::from_document(public, true).into_json();
    assert_eq!(json["id"], oid.to_hex());
    assert_eq!(json["tags"][1], "b");
    assert!(json["created"].is_i64());
}

// ============================================================================
// Store setup
// ============================================================================

#[tokio::test]
async fn test_store_enforces_allow_list() {
    let store = Store::connect(options().with_collections(["app.users", "audit.*"]))
        .await
        .unwrap();

    assert!(store.collection("users").is_ok());

    let err = store.collection("orders").unwrap_err();
    assert!(matches!(err, StoreError::NotAllowed { .. }));
    assert!(err.is_client_error());

    let audit = store.with_database("audit").unwrap();
    assert!(audit.collection("events").is_ok());
}

#[tokio::test]
async fn test_store_rejects_invalid_options() {
    let err = Store::connect(options().with_id_field("public id"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Config(_)));
}

// ============================================================================
// Writes that must not reach the server
// ============================================================================

async fn unreachable_store() -> Store {
    let mut options = options();
    options.pool.server_selection_timeout = Some(std::time::Duration::from_millis(200));
    Store::connect(options).await.unwrap()
}

#[tokio::test]
async fn test_delete_many_timestamp_only_filter_deletes_nothing() {
    let items = unreachable_store().await.collection("items").unwrap();

    assert_eq!(items.delete_many(doc! {}).await.unwrap(), 0);
    // "created" is the derived timestamp; mapping drops it, leaving {}
    assert_eq!(
        items.delete_many(doc! { "created": 1_700_000_000_i64 }).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_update_many_timestamp_only_filter_updates_nothing() {
    let items = unreachable_store().await.collection("items").unwrap();

    let modified = items
        .update_many(doc! { "created": 1_700_000_000_i64 }, doc! { "n": 1 })
        .await
        .unwrap();
    assert_eq!(modified, 0);
}

#[tokio::test]
async fn test_bulk_write_missing_id_fails_before_any_write() {
    let items = unreachable_store().await.collection("items").unwrap();
    let batch = || {
        vec![
            doc! { "id": "507f1f77bcf86cd799439011", "n": 1 },
            doc! { "n": 2 },
        ]
    };

    // MissingId rather than a connection error: nothing was sent
    for ordered in [true, false] {
        let err = items.update_bulk(batch(), ordered).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingId(ref op) if op == "update_bulk"));
        assert!(err.is_client_error());

        let err = items.replace_bulk(batch(), ordered).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingId(ref op) if op == "replace_bulk"));
    }

    let err = items
        .update_bulk(vec![doc! { "id": Bson::Null, "n": 1 }], true)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingId(_)));
}

#[test]
fn test_object_id_helpers() {
    let hex = "507f1f77bcf86cd799439011";
    assert!(matches!(mongostore::object_id(hex), Bson::ObjectId(_)));
    assert_eq!(mongostore::object_id("abc"), Bson::String("abc".to_string()));
    assert_eq!(mongostore::object_ids([hex, hex]).len(), 2);
}
