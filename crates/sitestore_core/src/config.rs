//! Process configuration for the store and its bootstrap collaborators.
//!
//! # Responsibility
//! - Hold database, logging, startup-retry and collection settings.
//! - Validate settings before any connection is opened.
//!
//! # Invariants
//! - Defaults mirror the built-in migrations (`posts`, `projects`).
//! - `validate()` never touches the file system or database.

use crate::db::migrations::DEFAULT_COLLECTIONS;
use crate::db::RetryPolicy;
use crate::logging::default_log_level;
use crate::model::collection::CollectionName;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DATABASE_PATH: &str = "sitestore.sqlite3";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyDatabasePath,
    ZeroRetryAttempts,
    RetryDelayOrder { base_ms: u64, max_ms: u64 },
    InvalidCollection(String),
    Parse(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDatabasePath => write!(f, "database_path cannot be empty"),
            Self::ZeroRetryAttempts => {
                write!(f, "startup_retry.max_attempts must be at least 1")
            }
            Self::RetryDelayOrder { base_ms, max_ms } => write!(
                f,
                "startup_retry.base_delay_ms ({base_ms}) must be <= max_delay_ms ({max_ms})"
            ),
            Self::InvalidCollection(message) => write!(f, "invalid collection: {message}"),
            Self::Parse(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// Top-level settings consumed by the CLI and embedding front ends.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub database_path: PathBuf,
    pub busy_timeout_ms: u64,
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub startup_retry: RetryPolicy,
    pub collections: Vec<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            log_level: default_log_level().to_string(),
            log_dir: None,
            startup_retry: RetryPolicy::default(),
            collections: DEFAULT_COLLECTIONS
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }
}

impl CoreConfig {
    /// Parses a JSON document; missing keys take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if self.startup_retry.max_attempts == 0 {
            return Err(ConfigError::ZeroRetryAttempts);
        }
        if self.startup_retry.base_delay_ms > self.startup_retry.max_delay_ms {
            return Err(ConfigError::RetryDelayOrder {
                base_ms: self.startup_retry.base_delay_ms,
                max_ms: self.startup_retry.max_delay_ms,
            });
        }
        for name in &self.collections {
            CollectionName::parse(name)
                .map_err(|err| ConfigError::InvalidCollection(err.to_string()))?;
        }
        Ok(())
    }
}
