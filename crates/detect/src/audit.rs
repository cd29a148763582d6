//! In-memory structured audit trail for rule evaluation.
//!
//! Keeps per-rule entries capped at a configurable maximum with FIFO
//! eviction, behind `std::sync::RwLock` so both rayon workers and the
//! caller's threads can record. Configuration problems (unresolved
//! properties, dropped actions) land here as queryable records, not just
//! log lines.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Severity of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl AuditLevel {
    /// Numeric severity for comparison (higher = more severe).
    fn severity(self) -> u8 {
        match self {
            AuditLevel::Debug => 0,
            AuditLevel::Info => 1,
            AuditLevel::Warning => 2,
            AuditLevel::Error => 3,
        }
    }
}

/// Phase of a detection pass that produced the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPhase {
    SnapshotLoad,
    Evaluation,
    ActionDispatch,
    DraftEmit,
    EffectDelivery,
    Complete,
}

/// One audit record for one rule.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub rule_id: String,
    pub level: AuditLevel,
    pub phase: DetectionPhase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Per-rule audit log with FIFO eviction.
pub struct AuditLog {
    entries: RwLock<HashMap<String, VecDeque<AuditEntry>>>,
    max_entries_per_rule: usize,
}

impl AuditLog {
    /// Create an audit log with the default cap of 500 entries per rule.
    pub fn new() -> Self {
        Self::with_max_entries(500)
    }

    pub fn with_max_entries(max: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries_per_rule: max,
        }
    }

    /// Append an entry for a rule.
    pub fn record(
        &self,
        rule_id: &str,
        level: AuditLevel,
        phase: DetectionPhase,
        message: impl Into<String>,
    ) {
        self.record_with_details(rule_id, level, phase, message, None);
    }

    /// Append an entry with structured details.
    pub fn record_with_details(
        &self,
        rule_id: &str,
        level: AuditLevel,
        phase: DetectionPhase,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            rule_id: rule_id.to_string(),
            level,
            phase,
            message: message.into(),
            details,
        };

        let mut guard = self.entries.write().expect("audit log lock poisoned");
        let deque = guard.entry(entry.rule_id.clone()).or_default();
        deque.push_back(entry);
        while deque.len() > self.max_entries_per_rule {
            deque.pop_front();
        }
    }

    /// Entries for one rule, newest first, filtered by minimum level and
    /// optionally by phase.
    pub fn entries_for(
        &self,
        rule_id: &str,
        min_level: AuditLevel,
        phase: Option<DetectionPhase>,
        limit: usize,
    ) -> Vec<AuditEntry> {
        let guard = self.entries.read().expect("audit log lock poisoned");
        let Some(deque) = guard.get(rule_id) else {
            return Vec::new();
        };

        deque
            .iter()
            .rev()
            .filter(|e| e.level.severity() >= min_level.severity())
            .filter(|e| phase.map_or(true, |p| e.phase == p))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Drop all entries for one rule.
    pub fn clear(&self, rule_id: &str) {
        self.entries
            .write()
            .expect("audit log lock poisoned")
            .remove(rule_id);
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
