//! Human review workflow for detected anomalies.
//!
//! This crate provides:
//! - The `Anomaly` record admitted from detection drafts
//! - Append-only `FeedbackEvent` history entries
//! - The review state machine with its legal-transition table
//! - An in-memory ledger enforcing idempotent admission and
//!   optimistic-concurrency feedback submission

pub mod anomaly;
pub mod error;
pub mod feedback;
pub mod workflow;

pub use anomaly::Anomaly;
pub use error::ReviewError;
pub use feedback::{FeedbackEvent, ReviewerFeedback};
pub use workflow::{transition_allowed, ReviewLedger};
