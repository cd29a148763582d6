//! Review workflow errors.
//!
//! Both variants are explicit rejections surfaced to the caller; the
//! workflow never silently retries or overwrites.

use fleetsight_core::FeedbackStatus;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    /// The requested status change is not in the legal-transition table.
    #[error("illegal transition from '{from}' to '{to}'")]
    IllegalTransition {
        from: FeedbackStatus,
        to: FeedbackStatus,
    },

    /// The caller's read of the anomaly is stale; re-read and retry.
    #[error("concurrent modification: expected version {expected}, current is {actual}")]
    ConcurrentModification { expected: u64, actual: u64 },

    /// No anomaly with this id exists in the ledger.
    #[error("unknown anomaly: {0}")]
    UnknownAnomaly(Uuid),
}
