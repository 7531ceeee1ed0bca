use course_core::db::migrations::latest_version;
use course_core::db::{connect, open_db, open_db_in_memory, ConnectionError, StoreConfig};
use course_core::{CourseInput, CourseRepository};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory(&StoreConfig::default()).unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "documents");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("courses.sqlite3");

    let conn_first = open_db(&path, &StoreConfig::default()).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path, &StoreConfig::default()).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "documents");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path, &StoreConfig::default()).unwrap_err();
    match err {
        ConnectionError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn connect_to_localhost_creates_data_dir_and_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        data_dir: dir.path().join("nested").join("data"),
        ..StoreConfig::default()
    };

    let repo = CourseRepository::new(connect("sqlite://localhost/playground", &config).unwrap());
    let course = repo
        .create(&CourseInput {
            name: Some("Angular Course".to_string()),
            category: Some("web".to_string()),
            tags: vec!["angular".to_string()],
            ..CourseInput::default()
        })
        .unwrap();
    repo.into_inner().close().unwrap();

    assert!(config.data_dir.join("playground.sqlite3").is_file());

    let reopened = CourseRepository::new(connect("sqlite://localhost/playground", &config).unwrap());
    assert_eq!(reopened.find_by_id(course.id).unwrap(), course);
}

#[test]
fn connect_rejects_malformed_uris() {
    for uri in ["mongodb://localhost/playground", "sqlite://remote/playground", ""] {
        match connect(uri, &StoreConfig::default()) {
            Err(err @ ConnectionError::InvalidUri(_)) => {
                assert_eq!(err.error_code(), "invalid_uri");
            }
            Err(other) => panic!("unexpected error for `{uri}`: {other}"),
            Ok(_) => panic!("expected `{uri}` to be rejected"),
        }
    }
}

#[test]
fn memory_databases_are_private_per_connection() {
    let config = StoreConfig::default();
    let first = CourseRepository::new(connect("sqlite://memory/shared", &config).unwrap());
    first
        .create(&CourseInput {
            name: Some("Angular Course".to_string()),
            category: Some("web".to_string()),
            tags: vec!["angular".to_string()],
            ..CourseInput::default()
        })
        .unwrap();

    let second = CourseRepository::new(connect("sqlite://memory/shared", &config).unwrap());
    assert_eq!(second.count(&course_core::Filter::All).unwrap(), 0);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
