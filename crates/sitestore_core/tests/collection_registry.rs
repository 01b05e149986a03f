use sitestore_core::db::{open_db_in_memory, provision_collection};
use sitestore_core::{CollectionRegistry, StoreError, StoreErrorKind};

#[test]
fn load_registers_migrated_collections() {
    let conn = open_db_in_memory().unwrap();

    let registry = CollectionRegistry::load(&conn, ["posts", "projects"]).unwrap();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.names(), vec!["posts", "projects"]);
    assert!(registry.contains(" posts "));
    assert_eq!(registry.resolve("projects").unwrap().as_str(), "projects");
}

#[test]
fn load_rejects_missing_table() {
    let conn = open_db_in_memory().unwrap();

    let err = CollectionRegistry::load(&conn, ["posts", "talks"]).unwrap_err();
    assert!(matches!(err, StoreError::MissingRequiredTable(ref table) if table == "talks"));
}

#[test]
fn load_rejects_table_missing_entity_column() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE drafts (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    )
    .unwrap();

    let err = CollectionRegistry::load(&conn, ["drafts"]).unwrap_err();
    assert!(matches!(
        err,
        StoreError::MissingRequiredColumn {
            ref table,
            column: "archived"
        } if table == "drafts"
    ));
}

#[test]
fn load_rejects_duplicates_and_malformed_names() {
    let conn = open_db_in_memory().unwrap();

    let duplicate = CollectionRegistry::load(&conn, ["posts", " posts"]).unwrap_err();
    assert!(matches!(duplicate, StoreError::DuplicateCollection(_)));

    let malformed = CollectionRegistry::load(&conn, ["posts--"]).unwrap_err();
    assert_eq!(malformed.kind(), StoreErrorKind::Validation);
}

#[test]
fn discover_skips_tables_without_entity_shape() {
    let conn = open_db_in_memory().unwrap();
    provision_collection(&conn, "talks").unwrap();
    conn.execute_batch("CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT);")
        .unwrap();

    let registry = CollectionRegistry::discover(&conn).unwrap();

    assert_eq!(registry.names(), vec!["posts", "projects", "talks"]);
    assert!(!registry.contains("settings"));
}

#[test]
fn resolve_distinguishes_unknown_from_malformed() {
    let registry = CollectionRegistry::default();
    assert!(registry.is_empty());

    let unknown = registry.resolve("posts").unwrap_err();
    assert!(matches!(unknown, StoreError::UnknownCollection(_)));

    let malformed = registry.resolve("").unwrap_err();
    assert!(matches!(malformed, StoreError::InvalidCollection(_)));

    assert_eq!(unknown.kind(), StoreErrorKind::Validation);
    assert_eq!(malformed.kind(), StoreErrorKind::Validation);
}

#[test]
fn names_match_without_regard_to_case() {
    let conn = open_db_in_memory().unwrap();

    let registry = CollectionRegistry::load(&conn, ["posts"]).unwrap();
    assert_eq!(registry.resolve("Posts").unwrap().as_str(), "posts");
    assert!(registry.contains("POSTS"));

    let duplicate = CollectionRegistry::load(&conn, ["posts", "POSTS"]).unwrap_err();
    assert!(matches!(duplicate, StoreError::DuplicateCollection(_)));
}
