//! Anomaly classification, review status, and detection drafts.
//!
//! A draft is what the detector emits; it only becomes a stored anomaly once
//! the persistence collaborator upserts it under its idempotency key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category tag attached to a detected anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    HighSpend,
    Location,
    Frequency,
    TimeOfDay,
    FuelMetric,
    Generic,
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyType::HighSpend => write!(f, "high_spend"),
            AnomalyType::Location => write!(f, "location"),
            AnomalyType::Frequency => write!(f, "frequency"),
            AnomalyType::TimeOfDay => write!(f, "time_of_day"),
            AnomalyType::FuelMetric => write!(f, "fuel_metric"),
            AnomalyType::Generic => write!(f, "generic"),
        }
    }
}

/// Review status of an anomaly. This is the review workflow's state variable;
/// only the workflow mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    PendingReview,
    Okay,
    Investigate,
    ConfirmedFraudOrMisuse,
    Miscategorized,
}

impl FeedbackStatus {
    /// Closed statuses: no further status change is legal, only amendments.
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            FeedbackStatus::Okay
                | FeedbackStatus::ConfirmedFraudOrMisuse
                | FeedbackStatus::Miscategorized
        )
    }
}

impl std::fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedbackStatus::PendingReview => write!(f, "pending_review"),
            FeedbackStatus::Okay => write!(f, "okay"),
            FeedbackStatus::Investigate => write!(f, "investigate"),
            FeedbackStatus::ConfirmedFraudOrMisuse => write!(f, "confirmed_fraud_or_misuse"),
            FeedbackStatus::Miscategorized => write!(f, "miscategorized"),
        }
    }
}

/// A detected anomaly, not yet persisted.
///
/// Keyed by (transaction id, rule id): the persistence collaborator upserts
/// on that pair, which is what makes repeated detection runs idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDraft {
    pub transaction_id: String,
    pub rule_id: String,
    pub anomaly_type: AnomalyType,
    /// Human-readable explanation rendered from the rule's reason template.
    pub reason: String,
    /// Score passed through from the external inference signal, if any.
    pub score: Option<f64>,
    pub detected_at: DateTime<Utc>,
    pub status: FeedbackStatus,
}

impl AnomalyDraft {
    pub fn new(
        transaction_id: impl Into<String>,
        rule_id: impl Into<String>,
        anomaly_type: AnomalyType,
        reason: impl Into<String>,
        score: Option<f64>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            rule_id: rule_id.into(),
            anomaly_type,
            reason: reason.into(),
            score,
            detected_at,
            status: FeedbackStatus::PendingReview,
        }
    }

    /// Uniqueness key for idempotent upsert.
    pub fn idempotency_key(&self) -> (&str, &str) {
        (&self.transaction_id, &self.rule_id)
    }
}
