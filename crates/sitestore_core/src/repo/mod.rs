//! Entity store abstractions and persistence implementation.
//!
//! # Responsibility
//! - Define the capability set callers use to reach any collection.
//! - Isolate SQLite query details from the caller layer.
//!
//! # Invariants
//! - Collection names resolve through `CollectionRegistry` before use.
//! - Store APIs return classified errors (`StoreErrorKind`) rather than raw
//!   engine failures.

pub mod collection_registry;
pub mod context;
pub mod entity_store;
pub mod error;
