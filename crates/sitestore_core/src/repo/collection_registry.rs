//! Registry of collections the store may target.
//!
//! # Responsibility
//! - Map runtime collection names to relations verified to carry the entity
//!   row shape.
//! - Reject unknown or malformed names before any SQL is issued.
//!
//! # Invariants
//! - The registry is immutable once built.
//! - Lookups ignore ASCII case, matching SQLite identifier resolution.
//! - Every registered table had all `ENTITY_COLUMNS` at registration time.

use super::error::{StoreError, StoreResult};
use crate::model::collection::CollectionName;
use log::{debug, info};
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Columns every entity relation must expose.
pub const ENTITY_COLUMNS: [&str; 6] = [
    "id",
    "name",
    "content",
    "created_at",
    "updated_at",
    "archived",
];

/// Immutable set of verified collections keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    collections: BTreeMap<String, CollectionName>,
}

impl CollectionRegistry {
    /// Registers `names`, verifying each relation against `conn`.
    ///
    /// # Errors
    /// - `InvalidCollection` for malformed names.
    /// - `DuplicateCollection` when a name is listed twice.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` for relations that
    ///   do not match the entity shape.
    pub fn load<I, S>(conn: &Connection, names: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut collections = BTreeMap::new();
        for raw in names {
            let name = CollectionName::parse(raw.as_ref())?;
            ensure_entity_table(conn, &name)?;
            if collections
                .insert(registry_key(name.as_str()), name.clone())
                .is_some()
            {
                return Err(StoreError::DuplicateCollection(name.to_string()));
            }
        }

        info!(
            "event=registry_load module=repo status=ok collections={}",
            collections.len()
        );
        Ok(Self { collections })
    }

    /// Registers every user table in `conn` that has the entity shape.
    /// Tables with other shapes are skipped.
    pub fn discover(conn: &Connection) -> StoreResult<Self> {
        let mut stmt = conn.prepare(
            "SELECT name
             FROM sqlite_master
             WHERE type = 'table'
             ORDER BY name ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut collections = BTreeMap::new();

        while let Some(row) = rows.next()? {
            let table: String = row.get(0)?;
            let Ok(name) = CollectionName::parse(&table) else {
                continue;
            };
            if missing_entity_column(conn, name.as_str())?.is_some() {
                debug!(
                    "event=registry_discover module=repo status=skip table={}",
                    table
                );
                continue;
            }
            collections.insert(registry_key(name.as_str()), name);
        }

        info!(
            "event=registry_discover module=repo status=ok collections={}",
            collections.len()
        );
        Ok(Self { collections })
    }

    /// Resolves a caller-supplied name to a registered collection.
    pub fn resolve(&self, raw: &str) -> StoreResult<&CollectionName> {
        let name = CollectionName::parse(raw)?;
        self.collections
            .get(&registry_key(name.as_str()))
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.resolve(raw).is_ok()
    }

    /// Registered lookup keys (lowercase) in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

fn registry_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn ensure_entity_table(conn: &Connection, name: &CollectionName) -> StoreResult<()> {
    if !table_exists(conn, name.as_str())? {
        return Err(StoreError::MissingRequiredTable(name.to_string()));
    }
    if let Some(column) = missing_entity_column(conn, name.as_str())? {
        return Err(StoreError::MissingRequiredColumn {
            table: name.to_string(),
            column,
        });
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn missing_entity_column(conn: &Connection, table: &str) -> StoreResult<Option<&'static str>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let mut rows = stmt.query([table])?;
    let mut present = Vec::new();
    while let Some(row) = rows.next()? {
        let column: String = row.get(0)?;
        present.push(column);
    }

    Ok(ENTITY_COLUMNS
        .iter()
        .copied()
        .find(|required| !present.iter().any(|column| column == required)))
}
