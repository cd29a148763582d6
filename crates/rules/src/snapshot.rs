//! Immutable rule snapshots captured once per detection batch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleetsight_core::TransactionKind;
use indexmap::IndexMap;

use crate::schema::{Policy, Rule};
use crate::validation::validate_policy;

/// Errors raised while admitting policies into a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// A policy failed validation; no partial snapshot is built.
    #[error("policy '{policy_id}' failed validation: {details}")]
    InvalidPolicy { policy_id: String, details: String },

    /// The same rule id appeared in more than one policy.
    #[error("rule id '{0}' appears in more than one policy")]
    DuplicateRuleId(String),
}

/// A consistent, immutable view of the active rules.
///
/// Built once at batch start and discarded after; rules changing between
/// batches never affect a batch in flight. Rules are held in evaluation
/// order (ascending priority, ties broken by rule id) so every consumer
/// sees the same deterministic sequence.
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    rules: Vec<Arc<Rule>>,
    loaded_at: DateTime<Utc>,
}

impl RuleSnapshot {
    /// Build a snapshot from validated policies.
    ///
    /// Every policy must pass validation; a single malformed rule rejects
    /// its whole policy and the snapshot build, so a detection pass never
    /// starts against partial rules. Disabled policies contribute nothing.
    pub fn from_policies(policies: &[Policy]) -> Result<Self, SnapshotError> {
        let mut by_id: IndexMap<String, Arc<Rule>> = IndexMap::new();

        for policy in policies {
            let result = validate_policy(policy);
            if !result.valid {
                return Err(SnapshotError::InvalidPolicy {
                    policy_id: policy.metadata.id.clone(),
                    details: result.summary(),
                });
            }
            if !policy.metadata.enabled {
                tracing::info!(policy_id = %policy.metadata.id, "skipping disabled policy");
                continue;
            }
            for rule in &policy.rules {
                if by_id.contains_key(&rule.id) {
                    return Err(SnapshotError::DuplicateRuleId(rule.id.clone()));
                }
                by_id.insert(rule.id.clone(), Arc::new(rule.clone()));
            }
        }

        let mut rules: Vec<Arc<Rule>> = by_id.into_values().collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

        Ok(Self {
            rules,
            loaded_at: Utc::now(),
        })
    }

    /// A snapshot with no rules (detection over it is a no-op).
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            loaded_at: Utc::now(),
        }
    }

    /// All rules in evaluation order, including disabled ones.
    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    /// Enabled rules applicable to `kind`, in evaluation order.
    pub fn candidates_for(&self, kind: TransactionKind) -> impl Iterator<Item = &Arc<Rule>> + '_ {
        self.rules
            .iter()
            .filter(move |rule| rule.enabled && rule.applies_to == kind)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}
