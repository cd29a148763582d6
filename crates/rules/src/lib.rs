//! Policy and rule model for fleet transaction anomaly detection.
//!
//! This crate provides:
//! - YAML-based policy definition with serde deserialization
//! - Condition trees (attribute checks combined with all/any/not)
//! - Declarative actions (create anomaly, update status, notify, invoke service)
//! - Load-time validation that rejects malformed rules before evaluation
//! - Immutable, priority-ordered rule snapshots captured once per batch

pub mod duration;
pub mod loader;
pub mod schema;
pub mod snapshot;
pub mod validation;
