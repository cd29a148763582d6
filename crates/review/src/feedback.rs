//! Reviewer feedback input and append-only history entries.

use chrono::{DateTime, Utc};
use fleetsight_core::FeedbackStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One reviewer submission against an anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerFeedback {
    pub reviewer_id: String,
    /// The status the reviewer wants the anomaly moved to.
    pub verdict: FeedbackStatus,
    #[serde(default)]
    pub notes: Option<String>,
    /// Corrected classification code, used with `Miscategorized` verdicts
    /// and amendments.
    #[serde(default)]
    pub corrected_code: Option<String>,
}

impl ReviewerFeedback {
    pub fn new(reviewer_id: impl Into<String>, verdict: FeedbackStatus) -> Self {
        Self {
            reviewer_id: reviewer_id.into(),
            verdict,
            notes: None,
            corrected_code: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_corrected_code(mut self, code: impl Into<String>) -> Self {
        self.corrected_code = Some(code.into());
        self
    }
}

/// One recorded status transition (or amendment) on an anomaly.
///
/// Events are append-only: they are never edited or deleted, so the
/// history is a faithful replay of every review decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub anomaly_id: Uuid,
    pub reviewer_id: String,
    pub from_status: FeedbackStatus,
    pub to_status: FeedbackStatus,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub corrected_code: Option<String>,
    /// True for correction events appended to a closed review. Amendments
    /// never change the status (`from_status == to_status`).
    #[serde(default)]
    pub amendment: bool,
}
