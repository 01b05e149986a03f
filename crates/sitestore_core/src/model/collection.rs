//! Collection naming rules.
//!
//! # Responsibility
//! - Validate runtime collection names before they reach SQL text.
//!
//! # Invariants
//! - A `CollectionName` is always a plain identifier safe to double-quote.
//! - Names in the reserved `sqlite_` namespace are never accepted.

use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_COLLECTION_NAME_CHARS: usize = 63;
const RESERVED_PREFIX: &str = "sqlite_";

/// Rejection reasons for collection names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionNameError {
    Empty,
    TooLong(String),
    InvalidCharacters(String),
    Reserved(String),
}

impl Display for CollectionNameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "collection name is required"),
            Self::TooLong(name) => write!(
                f,
                "collection name `{name}` exceeds {MAX_COLLECTION_NAME_CHARS} characters"
            ),
            Self::InvalidCharacters(name) => write!(
                f,
                "collection name `{name}` must match [A-Za-z_][A-Za-z0-9_]*"
            ),
            Self::Reserved(name) => write!(f, "collection name `{name}` is reserved"),
        }
    }
}

impl Error for CollectionNameError {}

/// Validated name of a relation that stores entities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionName(String);

impl CollectionName {
    /// Parses and validates a raw collection name. Surrounding whitespace is
    /// ignored; case is preserved here, and `CollectionRegistry` matches
    /// names without regard to ASCII case.
    pub fn parse(raw: &str) -> Result<Self, CollectionNameError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(CollectionNameError::Empty);
        }
        if name.chars().count() > MAX_COLLECTION_NAME_CHARS {
            return Err(CollectionNameError::TooLong(name.to_string()));
        }

        let mut chars = name.chars();
        let starts_ok = chars
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');
        if !starts_ok || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(CollectionNameError::InvalidCharacters(name.to_string()));
        }

        if name.to_ascii_lowercase().starts_with(RESERVED_PREFIX) {
            return Err(CollectionNameError::Reserved(name.to_string()));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted identifier for SQL text.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl Display for CollectionName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
