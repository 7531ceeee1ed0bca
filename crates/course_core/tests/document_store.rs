use course_core::db::{open_db, open_db_in_memory};
use course_core::store::DocumentCheck;
use course_core::{
    connect, Document, DocumentStore, Filter, FindOptions, Projection, SortDirection,
    SqliteDocumentStore, StoreConfig, StoreError, Update, UpdateOptions, ValidationError,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

const COLLECTION: &str = "widgets";

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn memory_store() -> SqliteDocumentStore {
    connect("sqlite://memory/store_test", &StoreConfig::default()).unwrap()
}

fn id_of(document: &Document) -> Uuid {
    Uuid::parse_str(document["_id"].as_str().unwrap()).unwrap()
}

#[test]
fn insert_assigns_fresh_id_and_ignores_supplied_one() {
    let store = memory_store();
    let supplied = Uuid::new_v4().to_string();

    let stored = store
        .insert(COLLECTION, doc(json!({"_id": supplied, "name": "alpha"})))
        .unwrap();
    let id = id_of(&stored);
    assert_ne!(id.to_string(), supplied);

    let loaded = store.find_by_id(COLLECTION, id).unwrap().unwrap();
    assert_eq!(loaded, stored);
    assert!(store.find_by_id("other", id).unwrap().is_none());
}

#[test]
fn find_applies_filter_sort_skip_limit_and_projection() {
    let store = memory_store();
    for (name, rank) in [("d", 4), ("b", 2), ("a", 1), ("c", 3), ("e", 5)] {
        store
            .insert(COLLECTION, doc(json!({"name": name, "rank": rank, "extra": true})))
            .unwrap();
    }

    let options = FindOptions::new(Filter::gt("rank", 1))
        .sort_by("name", SortDirection::Descending)
        .skip(1)
        .limit(2)
        .select(Projection::include(["name"]));
    let found = store.find(COLLECTION, &options).unwrap();

    let names: Vec<&str> = found
        .iter()
        .map(|document| document["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["d", "c"]);
    for document in &found {
        assert!(document.contains_key("_id"));
        assert!(!document.contains_key("extra"));
    }

    assert_eq!(store.count(COLLECTION, &Filter::lte("rank", 3)).unwrap(), 3);
}

#[test]
fn replace_overwrites_body_and_reports_missing_ids() {
    let store = memory_store();
    let stored = store
        .insert(COLLECTION, doc(json!({"name": "alpha", "stale": 1})))
        .unwrap();
    let id = id_of(&stored);

    assert!(store
        .replace(COLLECTION, id, doc(json!({"name": "beta"})))
        .unwrap());
    let loaded = store.find_by_id(COLLECTION, id).unwrap().unwrap();
    assert_eq!(Value::Object(loaded), json!({"_id": id.to_string(), "name": "beta"}));

    assert!(!store
        .replace(COLLECTION, Uuid::new_v4(), doc(json!({"name": "ghost"})))
        .unwrap());
}

#[test]
fn find_and_update_returns_original_or_updated() {
    let store = memory_store();
    let id = id_of(
        &store
            .insert(COLLECTION, doc(json!({"author": "Mosh", "views": 1})))
            .unwrap(),
    );

    let update = Update::new().set("author", "Jason").inc("views", 1);
    let before = store
        .find_and_update(COLLECTION, id, &update, UpdateOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(before["author"], json!("Mosh"));

    let after = store
        .find_and_update(
            COLLECTION,
            id,
            &Update::new().inc("views", 1),
            UpdateOptions {
                return_updated: true,
                ..UpdateOptions::default()
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(after["author"], json!("Jason"));
    assert_eq!(after["views"], json!(3));

    assert!(store
        .find_and_update(COLLECTION, Uuid::new_v4(), &update, UpdateOptions::default())
        .unwrap()
        .is_none());
}

#[test]
fn rejected_check_leaves_document_unchanged() {
    let store = memory_store();
    let stored = store
        .insert(COLLECTION, doc(json!({"author": "Mosh"})))
        .unwrap();
    let id = id_of(&stored);

    let reject_all: &DocumentCheck = &|_: &Document| -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        errors.push("author", "not allowed");
        Err(errors)
    };
    let err = store
        .find_and_update(
            COLLECTION,
            id,
            &Update::new().set("author", "Jason"),
            UpdateOptions {
                return_updated: true,
                check: Some(reject_all),
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));

    let invalid = store
        .find_and_update(
            COLLECTION,
            id,
            &Update::new().inc("author", 1),
            UpdateOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(invalid, StoreError::InvalidUpdate(_)));

    assert_eq!(store.find_by_id(COLLECTION, id).unwrap().unwrap(), stored);
}

#[test]
fn find_and_delete_removes_exactly_one_document() {
    let store = memory_store();
    let first = store.insert(COLLECTION, doc(json!({"n": 1}))).unwrap();
    let second = store.insert(COLLECTION, doc(json!({"n": 2}))).unwrap();

    let removed = store
        .find_and_delete(COLLECTION, id_of(&first))
        .unwrap()
        .unwrap();
    assert_eq!(removed, first);
    assert!(store
        .find_and_delete(COLLECTION, id_of(&first))
        .unwrap()
        .is_none());

    let remaining = store
        .find(COLLECTION, &FindOptions::new(Filter::All))
        .unwrap();
    assert_eq!(remaining, vec![second]);
}

#[test]
fn concurrent_increments_from_separate_connections_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        data_dir: dir.path().to_path_buf(),
        busy_timeout: Duration::from_secs(30),
        ..StoreConfig::default()
    };
    let uri = "sqlite://localhost/counters";

    let store = connect(uri, &config).unwrap();
    let id = id_of(&store.insert(COLLECTION, doc(json!({"hits": 0}))).unwrap());

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let config = config.clone();
            thread::spawn(move || {
                let store = connect(uri, &config).unwrap();
                for _ in 0..25 {
                    store
                        .find_and_update(
                            COLLECTION,
                            id,
                            &Update::new().inc("hits", 1),
                            UpdateOptions::default(),
                        )
                        .unwrap()
                        .unwrap();
                }
                store.close().unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let counter = store.find_by_id(COLLECTION, id).unwrap().unwrap();
    assert_eq!(counter["hits"], json!(100));
}

#[test]
fn operation_past_deadline_times_out_and_store_recovers() {
    let mut store = memory_store();
    for index in 0..500 {
        store
            .insert(
                COLLECTION,
                doc(json!({"name": format!("widget-{index:03}"), "tags": ["a", "b", "c"]})),
            )
            .unwrap();
    }

    store.set_operation_timeout(Some(Duration::ZERO));
    let err = store
        .find(
            COLLECTION,
            &FindOptions::new(Filter::All).sort_by("name", SortDirection::Ascending),
        )
        .unwrap_err();
    assert!(
        matches!(err, StoreError::Timeout { operation: "find", .. }),
        "unexpected error: {err}"
    );

    store.set_operation_timeout(None);
    assert_eq!(store.count(COLLECTION, &Filter::All).unwrap(), 500);
}

#[test]
fn cancel_handle_interrupts_running_operation() {
    let store = memory_store();
    for index in 0..2000 {
        store
            .insert(COLLECTION, doc(json!({"name": format!("widget-{index:04}")})))
            .unwrap();
    }
    let handle = store.cancel_handle();

    let worker = thread::spawn(move || {
        let options = FindOptions::new(Filter::All).sort_by("name", SortDirection::Descending);
        for _ in 0..1000 {
            match store.find(COLLECTION, &options) {
                Ok(_) => continue,
                Err(StoreError::Cancelled { operation }) => return Some(operation),
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        None
    });

    while !worker.is_finished() {
        handle.cancel();
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(worker.join().unwrap(), Some("find"));
}

#[test]
fn try_new_accepts_migrated_and_rejects_uninitialized_connections() {
    let migrated = open_db_in_memory(&StoreConfig::default()).unwrap();
    let store = SqliteDocumentStore::try_new(migrated, None).unwrap();
    assert_eq!(store.operation_timeout(), None);
    store.close().unwrap();

    let raw = Connection::open_in_memory().unwrap();
    match SqliteDocumentStore::try_new(raw, None) {
        Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert!(expected_version > 0),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn try_new_rejects_connection_without_documents_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stripped.sqlite3");
    let conn = open_db(&path, &StoreConfig::default()).unwrap();
    conn.execute_batch("DROP TABLE documents;").unwrap();

    assert!(matches!(
        SqliteDocumentStore::try_new(conn, None),
        Err(StoreError::MissingRequiredTable("documents"))
    ));
}
