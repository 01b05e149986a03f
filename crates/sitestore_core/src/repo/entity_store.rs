//! Entity store contract and SQLite implementation.
//!
//! # Responsibility
//! - Execute exactly one storage operation per call against a collection
//!   chosen at runtime.
//! - Enforce single-row write guarantees and soft-delete visibility.
//! - Stamp ids and timestamps; callers never choose them.
//!
//! # Invariants
//! - Archived rows are invisible to `get_by_id` and `list`.
//! - `create` and `update` fail unless exactly one row was written.
//! - `updated_at` strictly increases on every update or archive.
//! - Ids are validated before any SQL is issued.
//! - The store borrows its connection and holds no mutable state.

use super::collection_registry::CollectionRegistry;
use super::context::OpContext;
use super::error::{StoreError, StoreResult, WriteOp};
use crate::db::migrations::{current_user_version, latest_version};
use crate::model::collection::CollectionName;
use crate::model::entity::{now_epoch_ms, parse_entity_id, Entity, EntityId};
use log::{debug, error, info, warn};
use rusqlite::{params, Connection, Row, Rows};
use uuid::Uuid;

const ENTITY_COLUMNS_SQL: &str = "id, name, content, created_at, updated_at, archived";

/// Number of SQLite VM steps between cancellation checks.
const INTERRUPT_CHECK_OPS: i32 = 1_000;

/// Storage capability set over runtime-named collections.
///
/// Every call takes the caller's [`OpContext`]; implementations must stop
/// and return `Cancelled`/`DeadlineExceeded` once it is no longer live.
pub trait EntityStore {
    /// Inserts a new entity with a fresh id and `created_at == updated_at`.
    /// Caller-supplied `id`, timestamps and `archived` are ignored.
    fn create(&self, ctx: &OpContext, collection: &str, entity: &Entity) -> StoreResult<Entity>;

    /// Loads one visible (non-archived) entity.
    fn get_by_id(&self, ctx: &OpContext, collection: &str, id: &str) -> StoreResult<Entity>;

    /// Overwrites `name` and `content` of the row identified by `entity.id`.
    fn update(&self, ctx: &OpContext, collection: &str, entity: &Entity) -> StoreResult<Entity>;

    /// Physically removes the row regardless of archived state.
    ///
    /// Returns `false` when no row matched the id.
    fn delete(&self, ctx: &OpContext, collection: &str, id: &str) -> StoreResult<bool>;

    /// Soft-deletes a visible row.
    ///
    /// Returns `false` when the row disappeared between lookup and update.
    fn archive(&self, ctx: &OpContext, collection: &str, id: &str) -> StoreResult<bool>;

    /// Lists all visible rows ordered by `created_at`, then `id`.
    fn list(&self, ctx: &OpContext, collection: &str) -> StoreResult<Vec<Entity>>;
}

/// SQLite-backed entity store.
pub struct SqliteEntityStore<'conn> {
    conn: &'conn Connection,
    registry: CollectionRegistry,
}

impl<'conn> SqliteEntityStore<'conn> {
    /// Constructs a store from a migrated connection and a verified registry.
    pub fn try_new(conn: &'conn Connection, registry: CollectionRegistry) -> StoreResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_user_version(conn)?;
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn, registry })
    }

    /// Constructs a store serving every entity-shaped table in `conn`.
    pub fn try_discover(conn: &'conn Connection) -> StoreResult<Self> {
        let registry = CollectionRegistry::discover(conn)?;
        Self::try_new(conn, registry)
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    /// Runs `op` with an interrupt hook bound to `ctx`.
    fn run<T, F>(&self, ctx: &OpContext, op: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        ctx.check()?;
        self.conn
            .progress_handler(INTERRUPT_CHECK_OPS, Some(ctx.interrupt_hook()));
        let result = op(self.conn);
        self.conn.progress_handler(0, None::<fn() -> bool>);

        result.map_err(|err| match err {
            StoreError::Cancelled => match ctx.check() {
                Err(reason) => reason,
                Ok(()) => StoreError::Cancelled,
            },
            other => other,
        })
    }

    /// Runs a write inside a savepoint; any error rolls back what `op` wrote.
    fn run_write<T, F>(&self, ctx: &OpContext, op: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        ctx.check()?;
        self.conn.execute_batch("SAVEPOINT entity_write;")?;
        let result = self.run(ctx, op);
        let settle = match &result {
            Ok(_) => "RELEASE entity_write;",
            Err(_) => "ROLLBACK TO entity_write; RELEASE entity_write;",
        };
        self.conn.execute_batch(settle)?;
        result
    }

    fn insert(&self, ctx: &OpContext, collection: &str, entity: &Entity) -> StoreResult<Entity> {
        let table = self.registry.resolve(collection)?;
        let id = Uuid::new_v4();
        let now = now_epoch_ms();

        self.run_write(ctx, |conn| {
            let mut stmt = conn.prepare(&format!(
                "INSERT INTO {table} ({ENTITY_COLUMNS_SQL})
                 VALUES (?1, ?2, ?3, ?4, ?4, 0)
                 RETURNING {ENTITY_COLUMNS_SQL};",
                table = table.quoted()
            ))?;
            let rows = stmt.query(params![
                id.to_string(),
                entity.name.as_str(),
                entity.content.as_str(),
                now,
            ])?;
            let written = collect_entities(rows)?;
            single_written(table, WriteOp::Insert, written)
        })
    }

    fn fetch(&self, ctx: &OpContext, collection: &str, id: &str) -> StoreResult<Entity> {
        let id = parse_entity_id(id)?;
        let table = self.registry.resolve(collection)?;
        self.run(ctx, |conn| fetch_visible(conn, table, id))
    }

    fn overwrite(&self, ctx: &OpContext, collection: &str, entity: &Entity) -> StoreResult<Entity> {
        let id = entity.parsed_id()?;
        let table = self.registry.resolve(collection)?;
        let now = now_epoch_ms();

        self.run_write(ctx, |conn| {
            let mut stmt = conn.prepare(&format!(
                "UPDATE {table}
                 SET
                    name = ?1,
                    content = ?2,
                    updated_at = MAX(?3, updated_at + 1)
                 WHERE id = ?4
                 RETURNING {ENTITY_COLUMNS_SQL};",
                table = table.quoted()
            ))?;
            let rows = stmt.query(params![
                entity.name.as_str(),
                entity.content.as_str(),
                now,
                id.to_string(),
            ])?;
            let written = collect_entities(rows)?;
            single_written(table, WriteOp::Update, written)
        })
    }

    fn remove(&self, ctx: &OpContext, collection: &str, id: &str) -> StoreResult<bool> {
        let id = parse_entity_id(id)?;
        let table = self.registry.resolve(collection)?;

        let changed = self.run(ctx, |conn| {
            let changed = conn.execute(
                &format!("DELETE FROM {table} WHERE id = ?1;", table = table.quoted()),
                [id.to_string()],
            )?;
            Ok(changed)
        })?;

        if changed == 0 {
            warn!(
                "event=entity_delete module=repo status=noop collection={} id={}",
                table, id
            );
        }
        Ok(changed > 0)
    }

    fn flag_archived(&self, ctx: &OpContext, collection: &str, id: &str) -> StoreResult<bool> {
        let id = parse_entity_id(id)?;
        let table = self.registry.resolve(collection)?;

        // Absent and already-archived rows both surface as NotFound here.
        let current = self.run(ctx, |conn| fetch_visible(conn, table, id))?;
        let now = now_epoch_ms();

        let archived = self.run_write(ctx, |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE {table}
                     SET
                        archived = 1,
                        updated_at = MAX(?1, updated_at + 1)
                     WHERE id = ?2;",
                    table = table.quoted()
                ),
                params![now, current.id.as_str()],
            )?;
            match changed {
                0 | 1 => Ok(changed == 1),
                affected => Err(StoreError::Write {
                    collection: table.to_string(),
                    operation: WriteOp::Archive,
                    affected,
                }),
            }
        })?;

        if !archived {
            warn!(
                "event=entity_archive module=repo status=vanished collection={} id={}",
                table, id
            );
        }
        Ok(archived)
    }

    fn scan(&self, ctx: &OpContext, collection: &str) -> StoreResult<Vec<Entity>> {
        let table = self.registry.resolve(collection)?;
        self.run(ctx, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTITY_COLUMNS_SQL}
                 FROM {table}
                 WHERE archived = 0
                 ORDER BY created_at ASC, id ASC;",
                table = table.quoted()
            ))?;
            let rows = stmt.query([])?;
            collect_entities(rows)
        })
    }
}

impl EntityStore for SqliteEntityStore<'_> {
    fn create(&self, ctx: &OpContext, collection: &str, entity: &Entity) -> StoreResult<Entity> {
        let result = self.insert(ctx, collection, entity);
        if let Ok(created) = &result {
            info!(
                "event=entity_create module=repo status=ok collection={} id={}",
                collection, created.id
            );
        }
        logged("entity_create", collection, result)
    }

    fn get_by_id(&self, ctx: &OpContext, collection: &str, id: &str) -> StoreResult<Entity> {
        logged("entity_get", collection, self.fetch(ctx, collection, id))
    }

    fn update(&self, ctx: &OpContext, collection: &str, entity: &Entity) -> StoreResult<Entity> {
        logged("entity_update", collection, self.overwrite(ctx, collection, entity))
    }

    fn delete(&self, ctx: &OpContext, collection: &str, id: &str) -> StoreResult<bool> {
        logged("entity_delete", collection, self.remove(ctx, collection, id))
    }

    fn archive(&self, ctx: &OpContext, collection: &str, id: &str) -> StoreResult<bool> {
        logged("entity_archive", collection, self.flag_archived(ctx, collection, id))
    }

    fn list(&self, ctx: &OpContext, collection: &str) -> StoreResult<Vec<Entity>> {
        logged("entity_list", collection, self.scan(ctx, collection))
    }
}

fn logged<T>(event: &str, collection: &str, result: StoreResult<T>) -> StoreResult<T> {
    match &result {
        Ok(_) => debug!("event={event} module=repo status=ok collection={collection}"),
        Err(err) => error!(
            "event={} module=repo status=error collection={} error_code={} error={}",
            event,
            collection,
            err.code(),
            err
        ),
    }
    result
}

fn fetch_visible(conn: &Connection, table: &CollectionName, id: EntityId) -> StoreResult<Entity> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTITY_COLUMNS_SQL}
         FROM {table}
         WHERE id = ?1
           AND archived = 0;",
        table = table.quoted()
    ))?;
    let rows = stmt.query([id.to_string()])?;
    let mut matched = collect_entities(rows)?;

    match matched.len() {
        0 => Err(StoreError::NotFound {
            collection: table.to_string(),
            id,
        }),
        1 => Ok(matched.remove(0)),
        count => Err(StoreError::Conflict {
            collection: table.to_string(),
            id,
            matched: count,
        }),
    }
}

fn single_written(
    table: &CollectionName,
    operation: WriteOp,
    mut rows: Vec<Entity>,
) -> StoreResult<Entity> {
    if rows.len() != 1 {
        return Err(StoreError::Write {
            collection: table.to_string(),
            operation,
            affected: rows.len(),
        });
    }
    Ok(rows.remove(0))
}

fn collect_entities(mut rows: Rows<'_>) -> StoreResult<Vec<Entity>> {
    let mut entities = Vec::new();
    while let Some(row) = rows.next()? {
        entities.push(parse_entity_row(row)?);
    }
    Ok(entities)
}

fn parse_entity_row(row: &Row<'_>) -> StoreResult<Entity> {
    let archived = match row.get::<_, i64>("archived")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid archived value `{other}`"
            )));
        }
    };

    let entity = Entity {
        id: row.get("id")?,
        name: row.get("name")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        archived,
    };
    entity
        .validate_persisted()
        .map_err(|err| StoreError::InvalidData(format!("row `{}`: {err}", entity.id)))?;
    Ok(entity)
}
