//! SQLite storage bootstrap: open, migrate, provision and startup retry.
//!
//! # Responsibility
//! - Open and configure SQLite connections handed to the entity store.
//! - Apply schema migrations in deterministic order.
//! - Retry startup connectivity with bounded Fibonacci backoff.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - The store never opens or closes connections; this module owns that.

use crate::model::collection::CollectionNameError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
mod provision;
pub mod retry;

pub use open::{open_db, open_db_in_memory, open_db_with_retry, DEFAULT_BUSY_TIMEOUT};
pub use provision::provision_collection;
pub use retry::{FibonacciBackoff, RetryPolicy};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    InvalidCollection(CollectionNameError),
    RetryExhausted {
        attempts: u32,
        last: Box<DbError>,
    },
}

impl DbError {
    /// Returns whether the error means the engine could not be reached, as
    /// opposed to a statement or schema failure.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Sqlite(err) => is_unavailable_code(err.sqlite_error_code()),
            Self::RetryExhausted { .. } => true,
            Self::UnsupportedSchemaVersion { .. } | Self::InvalidCollection(_) => false,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::InvalidCollection(err) => write!(f, "{err}"),
            Self::RetryExhausted { attempts, last } => {
                write!(f, "database unreachable after {attempts} attempts: {last}")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::InvalidCollection(err) => Some(err),
            Self::RetryExhausted { last, .. } => Some(last.as_ref()),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<CollectionNameError> for DbError {
    fn from(value: CollectionNameError) -> Self {
        Self::InvalidCollection(value)
    }
}

pub(crate) fn is_unavailable_code(code: Option<ErrorCode>) -> bool {
    matches!(
        code,
        Some(
            ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::NotADatabase
        )
    )
}
