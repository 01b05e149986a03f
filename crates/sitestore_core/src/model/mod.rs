//! Domain model shared by the store and its callers.
//!
//! # Responsibility
//! - Define the uniform entity row shape used by every collection.
//! - Define the naming rules for runtime-selected collections.
//!
//! # Invariants
//! - Every persisted entity is identified by a store-assigned UUID.
//! - Archiving is a soft delete; only `Delete` removes rows physically.

pub mod collection;
pub mod entity;
