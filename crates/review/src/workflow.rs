//! The review state machine and the ledger that serializes writes.
//!
//! Transition policy (conservative): a pending anomaly can move to any
//! verdict; `investigate` can be re-reviewed into a closed verdict; closed
//! verdicts never change status again. Corrections to a closed review are
//! explicit amendment events, not status edits.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use fleetsight_core::{AnomalyDraft, FeedbackStatus};
use tracing::info;
use uuid::Uuid;

use crate::anomaly::Anomaly;
use crate::error::ReviewError;
use crate::feedback::{FeedbackEvent, ReviewerFeedback};

/// Legal-transition table for anomaly review statuses.
pub fn transition_allowed(from: FeedbackStatus, to: FeedbackStatus) -> bool {
    match from {
        // Initial state: any reviewer verdict is acceptable, but
        // re-submitting the current state is not a transition.
        FeedbackStatus::PendingReview => to != FeedbackStatus::PendingReview,
        // Re-review after investigation must settle the case.
        FeedbackStatus::Investigate => matches!(
            to,
            FeedbackStatus::Okay
                | FeedbackStatus::ConfirmedFraudOrMisuse
                | FeedbackStatus::Miscategorized
        ),
        // Closed verdicts are final; corrections go through amendments.
        FeedbackStatus::Okay
        | FeedbackStatus::ConfirmedFraudOrMisuse
        | FeedbackStatus::Miscategorized => false,
    }
}

/// Apply one reviewer submission to an anomaly.
///
/// The version precondition makes concurrent submissions safe: whichever
/// caller read the older version fails with `ConcurrentModification` and
/// must re-read before retrying. Status update and event append happen
/// together under the caller's exclusive borrow.
pub fn submit(
    anomaly: &mut Anomaly,
    feedback: &ReviewerFeedback,
    expected_version: u64,
) -> Result<FeedbackEvent, ReviewError> {
    if expected_version != anomaly.version {
        return Err(ReviewError::ConcurrentModification {
            expected: expected_version,
            actual: anomaly.version,
        });
    }
    if !transition_allowed(anomaly.status, feedback.verdict) {
        return Err(ReviewError::IllegalTransition {
            from: anomaly.status,
            to: feedback.verdict,
        });
    }

    let event = FeedbackEvent {
        anomaly_id: anomaly.id,
        reviewer_id: feedback.reviewer_id.clone(),
        from_status: anomaly.status,
        to_status: feedback.verdict,
        at: Utc::now(),
        notes: feedback.notes.clone(),
        corrected_code: feedback.corrected_code.clone(),
        amendment: false,
    };
    anomaly.history.push(event.clone());
    anomaly.status = feedback.verdict;
    anomaly.version += 1;

    info!(
        anomaly_id = %anomaly.id,
        reviewer = %event.reviewer_id,
        from = %event.from_status,
        to = %event.to_status,
        "review feedback recorded"
    );
    Ok(event)
}

/// Append a correction to an anomaly without changing its status.
///
/// This is how closed reviews are annotated: the record of what was wrong
/// lives in the history, the verdict stands.
pub fn amend(
    anomaly: &mut Anomaly,
    reviewer_id: &str,
    notes: Option<String>,
    corrected_code: Option<String>,
    expected_version: u64,
) -> Result<FeedbackEvent, ReviewError> {
    if expected_version != anomaly.version {
        return Err(ReviewError::ConcurrentModification {
            expected: expected_version,
            actual: anomaly.version,
        });
    }

    let event = FeedbackEvent {
        anomaly_id: anomaly.id,
        reviewer_id: reviewer_id.to_string(),
        from_status: anomaly.status,
        to_status: anomaly.status,
        at: Utc::now(),
        notes,
        corrected_code,
        amendment: true,
    };
    anomaly.history.push(event.clone());
    anomaly.version += 1;
    Ok(event)
}

// ── In-memory ledger ────────────────────────────────────────────────

#[derive(Default)]
struct LedgerInner {
    anomalies: HashMap<Uuid, Anomaly>,
    /// (transaction id, rule id) → anomaly id, the idempotency index.
    by_key: HashMap<(String, String), Uuid>,
}

/// In-memory anomaly store with idempotent admission and serialized
/// feedback writes.
///
/// Admission is keyed on (transaction id, rule id): admitting the same
/// draft twice returns the existing anomaly id instead of creating a
/// second record. Feedback submissions take the write lock, so writes to
/// one anomaly are single-writer; staleness is still detected through the
/// version precondition.
#[derive(Default)]
pub struct ReviewLedger {
    inner: RwLock<LedgerInner>,
}

impl ReviewLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a draft, returning the id of the (possibly pre-existing)
    /// anomaly for its (transaction id, rule id) pair.
    pub fn admit(&self, draft: AnomalyDraft) -> Uuid {
        let key = (draft.transaction_id.clone(), draft.rule_id.clone());
        let mut inner = self.inner.write().expect("ledger lock poisoned");
        if let Some(existing) = inner.by_key.get(&key) {
            return *existing;
        }
        let anomaly = Anomaly::from_draft(draft);
        let id = anomaly.id;
        inner.by_key.insert(key, id);
        inner.anomalies.insert(id, anomaly);
        id
    }

    /// Admit a whole detection output.
    pub fn admit_all(&self, drafts: impl IntoIterator<Item = AnomalyDraft>) -> Vec<Uuid> {
        drafts.into_iter().map(|d| self.admit(d)).collect()
    }

    /// Snapshot copy of an anomaly.
    pub fn get(&self, id: Uuid) -> Option<Anomaly> {
        self.inner
            .read()
            .expect("ledger lock poisoned")
            .anomalies
            .get(&id)
            .cloned()
    }

    /// Look up the anomaly for a (transaction id, rule id) pair.
    pub fn find_by_key(&self, transaction_id: &str, rule_id: &str) -> Option<Anomaly> {
        let inner = self.inner.read().expect("ledger lock poisoned");
        let id = inner
            .by_key
            .get(&(transaction_id.to_string(), rule_id.to_string()))?;
        inner.anomalies.get(id).cloned()
    }

    /// Submit reviewer feedback against a stored anomaly.
    pub fn submit(
        &self,
        id: Uuid,
        feedback: &ReviewerFeedback,
        expected_version: u64,
    ) -> Result<FeedbackEvent, ReviewError> {
        let mut inner = self.inner.write().expect("ledger lock poisoned");
        let anomaly = inner
            .anomalies
            .get_mut(&id)
            .ok_or(ReviewError::UnknownAnomaly(id))?;
        submit(anomaly, feedback, expected_version)
    }

    /// Append an amendment to a stored anomaly.
    pub fn amend(
        &self,
        id: Uuid,
        reviewer_id: &str,
        notes: Option<String>,
        corrected_code: Option<String>,
        expected_version: u64,
    ) -> Result<FeedbackEvent, ReviewError> {
        let mut inner = self.inner.write().expect("ledger lock poisoned");
        let anomaly = inner
            .anomalies
            .get_mut(&id)
            .ok_or(ReviewError::UnknownAnomaly(id))?;
        amend(anomaly, reviewer_id, notes, corrected_code, expected_version)
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("ledger lock poisoned").anomalies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
