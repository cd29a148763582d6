//! The anomaly record under review.

use chrono::{DateTime, Utc};
use fleetsight_core::{AnomalyDraft, AnomalyType, FeedbackStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::feedback::FeedbackEvent;

/// A stored anomaly flagging exactly one transaction.
///
/// Holds a single directional reference to the transaction; finding a
/// transaction's anomalies is a lookup, not a stored back-pointer. Created
/// once from a draft and never deleted here; archival is an external
/// concern. Status, version, and history are mutated only by the review
/// workflow in this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: Uuid,
    pub transaction_id: String,
    pub rule_id: String,
    pub anomaly_type: AnomalyType,
    pub detected_at: DateTime<Utc>,
    pub reason: String,
    pub score: Option<f64>,
    pub(crate) status: FeedbackStatus,
    /// Optimistic-concurrency token; bumped on every accepted submission.
    pub(crate) version: u64,
    pub(crate) history: Vec<FeedbackEvent>,
}

impl Anomaly {
    /// Admit a detection draft as a stored anomaly.
    pub fn from_draft(draft: AnomalyDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id: draft.transaction_id,
            rule_id: draft.rule_id,
            anomaly_type: draft.anomaly_type,
            detected_at: draft.detected_at,
            reason: draft.reason,
            score: draft.score,
            status: draft.status,
            version: 0,
            history: Vec::new(),
        }
    }

    pub fn status(&self) -> FeedbackStatus {
        self.status
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Full feedback history, oldest first.
    pub fn history(&self) -> &[FeedbackEvent] {
        &self.history
    }

    /// The (transaction id, rule id) pair detection deduplicates on.
    pub fn idempotency_key(&self) -> (&str, &str) {
        (&self.transaction_id, &self.rule_id)
    }
}
