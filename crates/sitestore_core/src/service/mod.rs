//! Caller-layer services.
//!
//! # Responsibility
//! - Turn transport requests into single store operations.
//! - Keep CLI and future HTTP front ends decoupled from storage details.

pub mod entity_service;
