//! Entity record model.
//!
//! # Responsibility
//! - Define the single row shape shared by every collection.
//! - Provide id parsing and persisted-state checks used by the store.
//!
//! # Invariants
//! - `id` is assigned by the store on create and never changes afterwards.
//! - Persisted rows satisfy `created_at <= updated_at`.
//! - `archived` is the source of truth for soft-delete visibility.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Parsed entity identifier.
pub type EntityId = Uuid;

/// Validation failures for caller-supplied or persisted entity data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    /// An operation that targets an existing row received no id.
    MissingId,
    /// The id is not a valid UUID string.
    MalformedId(String),
    /// The nil UUID is never assigned by the store.
    NilId,
    /// `updated_at` precedes `created_at`.
    InvalidTimestamps { created_at: i64, updated_at: i64 },
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingId => write!(f, "entity id is required"),
            Self::MalformedId(value) => write!(f, "entity id `{value}` is not a valid uuid"),
            Self::NilId => write!(f, "entity id must not be the nil uuid"),
            Self::InvalidTimestamps {
                created_at,
                updated_at,
            } => write!(
                f,
                "updatedAt ({updated_at}) must be >= createdAt ({created_at})"
            ),
        }
    }
}

impl Error for EntityValidationError {}

/// Canonical record stored in every collection.
///
/// Timestamps are Unix epoch milliseconds. On input only `name` and
/// `content` are required; the store owns the remaining fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// String-encoded UUID; empty until the entity is created.
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    /// Soft-delete flag. Archived rows are hidden from reads and listings.
    #[serde(default)]
    pub archived: bool,
}

impl Entity {
    /// Builds an unsaved entity draft. `id` and timestamps are filled in by
    /// the store on create.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            content: content.into(),
            created_at: 0,
            updated_at: 0,
            archived: false,
        }
    }

    /// Parses `id` into a typed identifier.
    pub fn parsed_id(&self) -> Result<EntityId, EntityValidationError> {
        parse_entity_id(&self.id)
    }

    /// Checks the invariants every row read back from storage must hold.
    pub fn validate_persisted(&self) -> Result<(), EntityValidationError> {
        self.parsed_id()?;
        if self.updated_at < self.created_at {
            return Err(EntityValidationError::InvalidTimestamps {
                created_at: self.created_at,
                updated_at: self.updated_at,
            });
        }
        Ok(())
    }

    /// Returns whether this entity is visible to reads and listings.
    pub fn is_active(&self) -> bool {
        !self.archived
    }
}

/// Parses a caller-supplied id string.
pub fn parse_entity_id(value: &str) -> Result<EntityId, EntityValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EntityValidationError::MissingId);
    }
    let id = Uuid::parse_str(trimmed)
        .map_err(|_| EntityValidationError::MalformedId(trimmed.to_string()))?;
    if id.is_nil() {
        return Err(EntityValidationError::NilId);
    }
    Ok(id)
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
