//! Entity-shaped table provisioning.
//!
//! Operators and tests use this to add collections beyond the ones created
//! by migrations. The store itself never creates tables.

use super::DbResult;
use crate::model::collection::CollectionName;
use log::info;
use rusqlite::Connection;

/// Creates the table for `name` with the entity row shape if it does not
/// exist yet. Returns the validated collection name.
pub fn provision_collection(conn: &Connection, name: &str) -> DbResult<CollectionName> {
    let collection = CollectionName::parse(name)?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0 CHECK (archived IN (0, 1))
        );",
        table = collection.quoted()
    ))?;

    info!(
        "event=collection_provision module=db status=ok collection={}",
        collection
    );
    Ok(collection)
}
