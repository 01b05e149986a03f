//! Store error taxonomy.
//!
//! Every failure leaves the store classified by [`StoreErrorKind`] so the
//! caller layer can map it to a transport status without string matching.

use crate::db::DbError;
use crate::model::collection::CollectionNameError;
use crate::model::entity::{EntityId, EntityValidationError};
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Write statements that must affect exactly one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Insert,
    Update,
    Archive,
}

impl Display for WriteOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Archive => "archive",
        };
        f.write_str(name)
    }
}

/// Coarse classification used by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    Validation,
    NotFound,
    Conflict,
    Write,
    EngineUnavailable,
    Cancelled,
    Internal,
}

#[derive(Debug)]
pub enum StoreError {
    Validation(EntityValidationError),
    InvalidCollection(CollectionNameError),
    UnknownCollection(String),
    NotFound {
        collection: String,
        id: EntityId,
    },
    Conflict {
        collection: String,
        id: EntityId,
        matched: usize,
    },
    Write {
        collection: String,
        operation: WriteOp,
        affected: usize,
    },
    Cancelled,
    DeadlineExceeded,
    Db(DbError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(String),
    MissingRequiredColumn {
        table: String,
        column: &'static str,
    },
    DuplicateCollection(String),
}

impl StoreError {
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidCollection(_) | Self::UnknownCollection(_) => {
                StoreErrorKind::Validation
            }
            Self::NotFound { .. } => StoreErrorKind::NotFound,
            Self::Conflict { .. } => StoreErrorKind::Conflict,
            Self::Write { .. } => StoreErrorKind::Write,
            Self::Cancelled | Self::DeadlineExceeded => StoreErrorKind::Cancelled,
            Self::Db(err) if err.is_unavailable() => StoreErrorKind::EngineUnavailable,
            Self::Db(_)
            | Self::InvalidData(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. }
            | Self::DuplicateCollection(_) => StoreErrorKind::Internal,
        }
    }

    /// Stable snake_case code for structured log lines.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            StoreErrorKind::Validation => "validation",
            StoreErrorKind::NotFound => "not_found",
            StoreErrorKind::Conflict => "conflict",
            StoreErrorKind::Write => "write",
            StoreErrorKind::EngineUnavailable => "engine_unavailable",
            StoreErrorKind::Cancelled => "cancelled",
            StoreErrorKind::Internal => "internal",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidCollection(err) => write!(f, "{err}"),
            Self::UnknownCollection(name) => write!(f, "unknown collection `{name}`"),
            Self::NotFound { collection, id } => {
                write!(f, "entity {id} not found in `{collection}`")
            }
            Self::Conflict {
                collection,
                id,
                matched,
            } => write!(
                f,
                "entity {id} matched {matched} rows in `{collection}`; expected exactly one"
            ),
            Self::Write {
                collection,
                operation,
                affected,
            } => write!(
                f,
                "{operation} on `{collection}` affected {affected} rows; expected exactly one"
            ),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::DeadlineExceeded => write!(f, "operation deadline exceeded"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted entity data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "table `{table}` is missing required column `{column}`")
            }
            Self::DuplicateCollection(name) => {
                write!(f, "collection `{name}` is already registered")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::InvalidCollection(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EntityValidationError> for StoreError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<CollectionNameError> for StoreError {
    fn from(value: CollectionNameError) -> Self {
        Self::InvalidCollection(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        if value.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) {
            return Self::Cancelled;
        }
        Self::Db(DbError::Sqlite(value))
    }
}
