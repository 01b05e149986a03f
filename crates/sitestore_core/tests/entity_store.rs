use sitestore_core::db::open_db_in_memory;
use sitestore_core::{
    CollectionRegistry, Entity, EntityStore, OpContext, SqliteEntityStore, StoreError,
    StoreErrorKind, WriteOp,
};
use rusqlite::Connection;
use std::time::{Duration, Instant};
use uuid::Uuid;

fn store(conn: &Connection) -> SqliteEntityStore<'_> {
    let registry = CollectionRegistry::load(conn, ["posts", "projects"]).unwrap();
    SqliteEntityStore::try_new(conn, registry).unwrap()
}

fn row_count(conn: &Connection, table: &str, id: &str) -> i64 {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE id = ?1;"),
        [id],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn create_assigns_id_and_equal_timestamps() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let mut draft = Entity::new("a", "x");
    draft.id = "11111111-2222-4333-8444-555555555555".to_string();
    draft.archived = true;
    draft.created_at = 42;

    let created = store.create(&ctx, "posts", &draft).unwrap();

    assert_ne!(created.id, draft.id);
    assert!(!Uuid::parse_str(&created.id).unwrap().is_nil());
    assert_eq!(created.name, "a");
    assert_eq!(created.content, "x");
    assert_eq!(created.created_at, created.updated_at);
    assert!(created.created_at > 42);
    assert!(!created.archived);
}

#[test]
fn create_then_get_returns_persisted_entity() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let created = store
        .create(&ctx, "projects", &Entity::new("site", "rebuild in rust"))
        .unwrap();
    let loaded = store.get_by_id(&ctx, "projects", &created.id).unwrap();

    assert_eq!(loaded, created);
    assert!(loaded.is_active());
}

#[test]
fn ids_are_unique_across_creates() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let first = store.create(&ctx, "posts", &Entity::new("a", "1")).unwrap();
    let second = store.create(&ctx, "posts", &Entity::new("a", "1")).unwrap();

    assert_ne!(first.id, second.id);
}

#[test]
fn update_changes_content_and_preserves_identity() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let created = store.create(&ctx, "posts", &Entity::new("a", "x")).unwrap();
    let mut changed = created.clone();
    changed.content = "y".to_string();
    changed.created_at = 1;

    let updated = store.update(&ctx, "posts", &changed).unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.content, "y");
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > updated.created_at);

    let loaded = store.get_by_id(&ctx, "posts", &created.id).unwrap();
    assert_eq!(loaded, updated);
}

#[test]
fn repeated_updates_keep_updated_at_increasing() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let mut entity = store.create(&ctx, "posts", &Entity::new("a", "x")).unwrap();
    let mut previous = entity.updated_at;
    for round in 0..5 {
        entity.content = format!("rev {round}");
        entity = store.update(&ctx, "posts", &entity).unwrap();
        assert!(entity.updated_at > previous);
        previous = entity.updated_at;
    }
}

#[test]
fn update_of_missing_row_is_write_error() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let mut ghost = Entity::new("ghost", "nothing");
    ghost.id = Uuid::new_v4().to_string();

    let err = store.update(&ctx, "posts", &ghost).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Write {
            operation: WriteOp::Update,
            affected: 0,
            ..
        }
    ));
    assert_eq!(err.kind(), StoreErrorKind::Write);
}

#[test]
fn update_requires_valid_id() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let err = store
        .update(&ctx, "posts", &Entity::new("a", "x"))
        .unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Validation);
}

#[test]
fn get_by_id_rejects_malformed_id_before_engine_access() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);

    // A cancelled context would fail any engine call; validation wins first.
    let ctx = OpContext::background();
    ctx.cancel();

    let err = store.get_by_id(&ctx, "posts", "not-a-uuid").unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Validation);
}

#[test]
fn get_by_id_of_absent_row_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let id = Uuid::new_v4();
    let err = store.get_by_id(&ctx, "posts", &id.to_string()).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { id: missing, .. } if missing == id));
}

#[test]
fn archive_hides_entity_from_get_and_list() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let archived = store.create(&ctx, "posts", &Entity::new("old", "x")).unwrap();
    let kept = store.create(&ctx, "posts", &Entity::new("new", "y")).unwrap();

    assert!(store.archive(&ctx, "posts", &archived.id).unwrap());

    let err = store.get_by_id(&ctx, "posts", &archived.id).unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::NotFound);

    let ids: Vec<String> = store
        .list(&ctx, "posts")
        .unwrap()
        .into_iter()
        .map(|entity| entity.id)
        .collect();
    assert_eq!(ids, vec![kept.id]);

    // The row is retained and its updated_at moved forward.
    let (flag, created_at, updated_at): (i64, i64, i64) = conn
        .query_row(
            "SELECT archived, created_at, updated_at FROM posts WHERE id = ?1;",
            [archived.id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(flag, 1);
    assert!(updated_at > created_at);
}

#[test]
fn archive_of_missing_or_archived_row_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let missing = store
        .archive(&ctx, "posts", &Uuid::new_v4().to_string())
        .unwrap_err();
    assert_eq!(missing.kind(), StoreErrorKind::NotFound);

    let entity = store.create(&ctx, "posts", &Entity::new("a", "x")).unwrap();
    assert!(store.archive(&ctx, "posts", &entity.id).unwrap());
    let again = store.archive(&ctx, "posts", &entity.id).unwrap_err();
    assert_eq!(again.kind(), StoreErrorKind::NotFound);
}

#[test]
fn delete_removes_rows_regardless_of_archived_state() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let live = store.create(&ctx, "posts", &Entity::new("live", "x")).unwrap();
    let archived = store.create(&ctx, "posts", &Entity::new("gone", "y")).unwrap();
    store.archive(&ctx, "posts", &archived.id).unwrap();

    assert!(store.delete(&ctx, "posts", &live.id).unwrap());
    assert!(store.delete(&ctx, "posts", &archived.id).unwrap());

    assert_eq!(row_count(&conn, "posts", &live.id), 0);
    assert_eq!(row_count(&conn, "posts", &archived.id), 0);
}

#[test]
fn delete_of_absent_row_reports_false() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let deleted = store
        .delete(&ctx, "posts", &Uuid::new_v4().to_string())
        .unwrap();
    assert!(!deleted);

    let err = store.delete(&ctx, "posts", "nope").unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Validation);
}

#[test]
fn list_of_empty_collection_is_empty() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);

    let entities = store.list(&OpContext::background(), "projects").unwrap();
    assert!(entities.is_empty());
}

#[test]
fn collections_are_isolated() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let post = store.create(&ctx, "posts", &Entity::new("a", "x")).unwrap();

    assert!(store.list(&ctx, "projects").unwrap().is_empty());
    let err = store.get_by_id(&ctx, "projects", &post.id).unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::NotFound);
}

#[test]
fn unknown_or_malformed_collection_is_validation_error() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let unknown = store.list(&ctx, "comments").unwrap_err();
    assert!(matches!(unknown, StoreError::UnknownCollection(ref name) if name == "comments"));
    assert_eq!(unknown.kind(), StoreErrorKind::Validation);

    let malformed = store
        .create(&ctx, "posts\"; DROP TABLE posts; --", &Entity::new("a", "x"))
        .unwrap_err();
    assert!(matches!(malformed, StoreError::InvalidCollection(_)));
    assert_eq!(malformed.kind(), StoreErrorKind::Validation);
}

fn seed_duplicate_legacy_rows(conn: &Connection) -> String {
    conn.execute_batch(
        "CREATE TABLE legacy (
            id TEXT NOT NULL,
            name TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0
        );",
    )
    .unwrap();
    let id = Uuid::new_v4().to_string();
    for name in ["first", "second"] {
        conn.execute(
            "INSERT INTO legacy (id, name, content, created_at, updated_at, archived)
             VALUES (?1, ?2, 'body', 1, 1, 0);",
            [id.as_str(), name],
        )
        .unwrap();
    }
    id
}

fn legacy_rows(conn: &Connection) -> Vec<(String, String, i64, i64)> {
    let mut stmt = conn
        .prepare("SELECT name, content, updated_at, archived FROM legacy ORDER BY name;")
        .unwrap();
    stmt.query_map([], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    })
    .unwrap()
    .collect::<Result<Vec<_>, _>>()
    .unwrap()
}

#[test]
fn duplicate_ids_surface_as_conflict() {
    let conn = open_db_in_memory().unwrap();
    let id = seed_duplicate_legacy_rows(&conn);

    let registry = CollectionRegistry::load(&conn, ["legacy"]).unwrap();
    let store = SqliteEntityStore::try_new(&conn, registry).unwrap();

    let err = store
        .get_by_id(&OpContext::background(), "legacy", &id)
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { matched: 2, .. }));
    assert_eq!(err.kind(), StoreErrorKind::Conflict);
}

#[test]
fn multi_row_update_is_rolled_back() {
    let conn = open_db_in_memory().unwrap();
    let id = seed_duplicate_legacy_rows(&conn);
    let before = legacy_rows(&conn);

    let registry = CollectionRegistry::load(&conn, ["legacy"]).unwrap();
    let store = SqliteEntityStore::try_new(&conn, registry).unwrap();

    let mut entity = Entity::new("merged", "rewritten");
    entity.id = id;
    let err = store
        .update(&OpContext::background(), "legacy", &entity)
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Write {
            operation: WriteOp::Update,
            affected: 2,
            ..
        }
    ));

    assert_eq!(legacy_rows(&conn), before);
    assert!(conn.is_autocommit());
}

#[test]
fn archive_of_duplicated_id_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let id = seed_duplicate_legacy_rows(&conn);
    let before = legacy_rows(&conn);

    let registry = CollectionRegistry::load(&conn, ["legacy"]).unwrap();
    let store = SqliteEntityStore::try_new(&conn, registry).unwrap();

    let err = store
        .archive(&OpContext::background(), "legacy", &id)
        .unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Conflict);
    assert_eq!(legacy_rows(&conn), before);
}

#[test]
fn successful_writes_are_committed() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let created = store.create(&ctx, "posts", &Entity::new("a", "x")).unwrap();
    let mut edited = created.clone();
    edited.content = "y".to_string();
    store.update(&ctx, "posts", &edited).unwrap();
    assert!(store.archive(&ctx, "posts", &created.id).unwrap());

    assert!(conn.is_autocommit());
    let (content, archived): (String, i64) = conn
        .query_row(
            "SELECT content, archived FROM posts WHERE id = ?1;",
            [created.id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(content, "y");
    assert_eq!(archived, 1);
}

#[test]
fn invalid_persisted_rows_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE scratch (
            id TEXT NOT NULL,
            name TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0
        );
        INSERT INTO scratch VALUES ('not-a-uuid', 'n', 'c', 1, 1, 0);",
    )
    .unwrap();

    let store = SqliteEntityStore::try_discover(&conn).unwrap();
    let err = store
        .list(&OpContext::background(), "scratch")
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
    assert_eq!(err.kind(), StoreErrorKind::Internal);
}

#[test]
fn cancelled_context_aborts_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);

    let ctx = OpContext::background();
    ctx.cancel();

    let err = store
        .create(&ctx, "posts", &Entity::new("a", "x"))
        .unwrap_err();
    assert!(matches!(err, StoreError::Cancelled));
    assert_eq!(err.kind(), StoreErrorKind::Cancelled);

    let live = OpContext::background();
    assert!(store.list(&live, "posts").unwrap().is_empty());
}

#[test]
fn expired_deadline_is_reported() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);

    let ctx = OpContext::with_deadline(Instant::now() - Duration::from_millis(1));
    let err = store.list(&ctx, "posts").unwrap_err();
    assert!(matches!(err, StoreError::DeadlineExceeded));

    let generous = OpContext::with_timeout(Duration::from_secs(30));
    assert!(store.list(&generous, "posts").is_ok());
}

fn seed_posts(conn: &Connection, count: i64) {
    conn.execute(
        "WITH RECURSIVE seq(n) AS (
            SELECT 1
            UNION ALL
            SELECT n + 1 FROM seq WHERE n < ?1
        )
        INSERT INTO posts (id, name, content, created_at, updated_at, archived)
        SELECT printf('%08x-0000-4000-8000-000000000000', n), 'seed', 'body', n, n, 0
        FROM seq;",
        [count],
    )
    .unwrap();
}

const LARGE_COLLECTION: i64 = 300_000;

#[test]
fn deadline_interrupts_running_statement() {
    let conn = open_db_in_memory().unwrap();
    seed_posts(&conn, LARGE_COLLECTION);
    let store = store(&conn);

    let ctx = OpContext::with_timeout(Duration::from_millis(20));
    let started = Instant::now();
    let err = store.list(&ctx, "posts").unwrap_err();

    assert!(matches!(err, StoreError::DeadlineExceeded), "unexpected: {err}");
    assert_eq!(err.kind(), StoreErrorKind::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));

    let first_id = "00000001-0000-4000-8000-000000000000";
    let found = store
        .get_by_id(&OpContext::background(), "posts", first_id)
        .unwrap();
    assert_eq!(found.created_at, 1);
}

#[test]
fn cancel_from_another_thread_interrupts_running_statement() {
    let conn = open_db_in_memory().unwrap();
    seed_posts(&conn, LARGE_COLLECTION);
    let store = store(&conn);

    let ctx = OpContext::background();
    let remote = ctx.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        remote.cancel();
    });

    let err = store.list(&ctx, "posts").unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, StoreError::Cancelled), "unexpected: {err}");
    assert!(ctx.is_cancelled());
}

#[test]
fn store_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let result = SqliteEntityStore::try_new(&conn, CollectionRegistry::default());
    match result {
        Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert!(expected_version > 0),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn posts_lifecycle_scenario() {
    let conn = open_db_in_memory().unwrap();
    let store = store(&conn);
    let ctx = OpContext::background();

    let created = store.create(&ctx, "posts", &Entity::new("a", "x")).unwrap();
    assert!(Uuid::parse_str(&created.id).is_ok());
    assert!(!created.archived);

    let listed = store.list(&ctx, "posts").unwrap();
    assert_eq!(listed, vec![created.clone()]);

    assert!(store.archive(&ctx, "posts", &created.id).unwrap());
    assert!(store.list(&ctx, "posts").unwrap().is_empty());

    assert!(store.delete(&ctx, "posts", &created.id).unwrap());
    let err = store.get_by_id(&ctx, "posts", &created.id).unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::NotFound);
    assert_eq!(row_count(&conn, "posts", &created.id), 0);
}
