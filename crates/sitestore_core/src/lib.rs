//! Generic entity persistence for SiteStore.
//! This crate is the single source of truth for storage invariants: id
//! assignment, timestamp bookkeeping, single-row writes and soft delete.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, init_logging_from, logging_status};
pub use model::collection::{CollectionName, CollectionNameError};
pub use model::entity::{parse_entity_id, Entity, EntityId, EntityValidationError};
pub use repo::collection_registry::{CollectionRegistry, ENTITY_COLUMNS};
pub use repo::context::OpContext;
pub use repo::entity_store::{EntityStore, SqliteEntityStore};
pub use repo::error::{StoreError, StoreErrorKind, StoreResult, WriteOp};
pub use service::entity_service::{status_for, EntityService, ResponseStatus, ServiceResponse};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
