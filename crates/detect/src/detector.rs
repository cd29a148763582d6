//! The anomaly detector: evaluates applicable rules and resolves actions.
//!
//! Detection is a pure mapping from (transaction, snapshot, context) to
//! output values. All matching rules fire (this is not a first-match
//! system); evaluation order exists only so action dispatch is
//! deterministic. Errors local to one rule never abort the transaction,
//! and errors local to one transaction never abort the batch.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleetsight_core::{AnomalyDraft, FleetTransaction};
use fleetsight_rules::snapshot::RuleSnapshot;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::audit::{AuditLevel, AuditLog, DetectionPhase};
use crate::context::EvaluationContext;
use crate::dispatcher::{ActionDispatcher, EffectRequest};
use crate::evaluator::evaluate;
use crate::ports::ContextProvider;

/// A rule skipped for one transaction because evaluation failed.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSkip {
    pub rule_id: String,
    pub reason: String,
}

/// An action dropped because dispatch failed (e.g., template render error).
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedAction {
    pub rule_id: String,
    pub action: &'static str,
    pub reason: String,
}

/// Everything detection produced for one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOutput {
    pub transaction_id: String,
    /// Anomaly drafts in rule evaluation order, deduplicated per
    /// (transaction id, rule id).
    pub drafts: Vec<AnomalyDraft>,
    /// Non-anomaly effect requests in dispatch order.
    pub effects: Vec<EffectRequest>,
    pub skipped_rules: Vec<RuleSkip>,
    pub dropped_actions: Vec<DroppedAction>,
}

/// Outcome of a batch detection pass.
#[derive(Debug)]
pub struct BatchOutcome {
    /// One output per processed transaction, in input order.
    pub outputs: Vec<DetectionOutput>,
    /// True when the cancellation flag stopped the pass early. Outputs for
    /// unprocessed transactions are simply absent; nothing partial leaks.
    pub cancelled: bool,
}

/// Evaluates active rules against transactions and resolves their actions.
pub struct AnomalyDetector {
    dispatcher: ActionDispatcher,
    audit: Option<Arc<AuditLog>>,
}

impl AnomalyDetector {
    pub fn new() -> Self {
        Self {
            dispatcher: ActionDispatcher::new(),
            audit: None,
        }
    }

    /// Attach an audit log; evaluation and dispatch phases are recorded.
    pub fn with_audit(audit: Arc<AuditLog>) -> Self {
        Self {
            dispatcher: ActionDispatcher::new(),
            audit: Some(audit),
        }
    }

    /// Detect anomalies for a single transaction.
    pub fn detect(
        &self,
        ctx: &EvaluationContext<'_>,
        snapshot: &RuleSnapshot,
        detected_at: DateTime<Utc>,
    ) -> DetectionOutput {
        let txn = ctx.transaction();
        let mut output = DetectionOutput {
            transaction_id: txn.transaction_id.clone(),
            drafts: Vec::new(),
            effects: Vec::new(),
            skipped_rules: Vec::new(),
            dropped_actions: Vec::new(),
        };
        let mut emitted: HashSet<(String, String)> = HashSet::new();

        for rule in snapshot.candidates_for(txn.kind) {
            match evaluate(&rule.condition, ctx) {
                Ok(false) => {
                    debug!(rule_id = %rule.id, transaction_id = %txn.transaction_id, "no match");
                }
                Ok(true) => {
                    self.resolve_actions(rule, ctx, detected_at, &mut emitted, &mut output);
                }
                Err(e) => {
                    // Configuration problem scoped to this rule; the rest of
                    // the snapshot still evaluates.
                    warn!(
                        rule_id = %rule.id,
                        transaction_id = %txn.transaction_id,
                        error = %e,
                        "rule skipped for transaction"
                    );
                    self.record_audit(
                        &rule.id,
                        AuditLevel::Error,
                        DetectionPhase::Evaluation,
                        e.to_string(),
                    );
                    output.skipped_rules.push(RuleSkip {
                        rule_id: rule.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        output
    }

    fn resolve_actions(
        &self,
        rule: &fleetsight_rules::schema::Rule,
        ctx: &EvaluationContext<'_>,
        detected_at: DateTime<Utc>,
        emitted: &mut HashSet<(String, String)>,
        output: &mut DetectionOutput,
    ) {
        let txn = ctx.transaction();
        self.record_audit(
            &rule.id,
            AuditLevel::Info,
            DetectionPhase::Evaluation,
            format!("matched transaction '{}'", txn.transaction_id),
        );

        for action in &rule.actions {
            match self.dispatcher.dispatch(action, rule, ctx, detected_at) {
                Ok(EffectRequest::CreateAnomaly(draft)) => {
                    let key = (draft.transaction_id.clone(), draft.rule_id.clone());
                    if !emitted.insert(key) {
                        debug!(
                            rule_id = %rule.id,
                            transaction_id = %txn.transaction_id,
                            "duplicate draft suppressed"
                        );
                        continue;
                    }
                    self.record_audit(
                        &rule.id,
                        AuditLevel::Info,
                        DetectionPhase::DraftEmit,
                        format!("anomaly draft for '{}'", draft.transaction_id),
                    );
                    output.drafts.push(draft);
                }
                Ok(effect) => output.effects.push(effect),
                Err(e) => {
                    warn!(rule_id = %rule.id, error = %e, "action dropped");
                    self.record_audit(
                        &rule.id,
                        AuditLevel::Warning,
                        DetectionPhase::ActionDispatch,
                        e.to_string(),
                    );
                    output.dropped_actions.push(DroppedAction {
                        rule_id: rule.id.clone(),
                        action: action.label(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    /// Detect over a batch of transactions.
    ///
    /// Each transaction reads only the immutable snapshot and its own
    /// context, so the parallel path needs no locking. The cancellation
    /// flag is checked cooperatively before each transaction.
    pub fn detect_batch(
        &self,
        transactions: &[FleetTransaction],
        snapshot: &RuleSnapshot,
        provider: &dyn ContextProvider,
        detected_at: DateTime<Utc>,
        cancel: &AtomicBool,
        parallel: bool,
    ) -> BatchOutcome {
        if parallel {
            let outputs: Vec<Option<DetectionOutput>> = transactions
                .par_iter()
                .map(|txn| {
                    if cancel.load(Ordering::Relaxed) {
                        return None;
                    }
                    Some(self.detect_one(txn, snapshot, provider, detected_at))
                })
                .collect();
            let cancelled = outputs.iter().any(|o| o.is_none());
            BatchOutcome {
                outputs: outputs.into_iter().flatten().collect(),
                cancelled,
            }
        } else {
            let mut outputs = Vec::with_capacity(transactions.len());
            for txn in transactions {
                if cancel.load(Ordering::Relaxed) {
                    return BatchOutcome {
                        outputs,
                        cancelled: true,
                    };
                }
                outputs.push(self.detect_one(txn, snapshot, provider, detected_at));
            }
            BatchOutcome {
                outputs,
                cancelled: false,
            }
        }
    }

    fn detect_one(
        &self,
        transaction: &FleetTransaction,
        snapshot: &RuleSnapshot,
        provider: &dyn ContextProvider,
        detected_at: DateTime<Utc>,
    ) -> DetectionOutput {
        let history = provider.history_window(transaction);
        let ctx = EvaluationContext::new(
            transaction,
            &history,
            provider.frequency_window(),
            provider.regions(),
        );
        self.detect(&ctx, snapshot, detected_at)
    }

    fn record_audit(
        &self,
        rule_id: &str,
        level: AuditLevel,
        phase: DetectionPhase,
        message: impl Into<String>,
    ) {
        if let Some(audit) = &self.audit {
            audit.record(rule_id, level, phase, message);
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{NoRegions, RegionOracle};
    use fleetsight_core::{AnomalyType, FeedbackStatus, PropertyName, TransactionKind};
    use fleetsight_rules::schema::{
        Action, AttributeCheck, ComparisonOp, Condition, NotifyChannel, Policy, PolicyMetadata,
        Rule, Threshold,
    };
    use rust_decimal::Decimal;

    fn txn(id: &str, amount: i64) -> FleetTransaction {
        FleetTransaction {
            transaction_id: id.to_string(),
            uuid: None,
            kind: TransactionKind::General,
            timestamp: "2026-03-02T10:00:00Z".parse().unwrap(),
            amount: Decimal::from(amount),
            currency: "USD".to_string(),
            merchant_name: "Acme".to_string(),
            merchant_category: "fuel_station".to_string(),
            latitude: None,
            longitude: None,
            vehicle_id: None,
            driver_id: None,
            odometer_reading: None,
            fuel: None,
            maintenance: None,
            ml: None,
        }
    }

    fn amount_gt_rule(id: &str, priority: u32, limit: i64) -> Rule {
        Rule {
            id: id.to_string(),
            description: None,
            priority,
            enabled: true,
            applies_to: TransactionKind::General,
            condition: Condition::Attribute(AttributeCheck {
                property: PropertyName::Amount,
                op: ComparisonOp::Gt,
                threshold: Threshold::number(Decimal::from(limit)),
                optional: false,
            }),
            actions: vec![Action::CreateAnomaly {
                anomaly_type: AnomalyType::HighSpend,
                reason_template: format!("amount {{{{ amount }}}} exceeds {}", limit),
            }],
        }
    }

    fn snapshot_of(rules: Vec<Rule>) -> RuleSnapshot {
        let policy = Policy {
            api_version: "v1".to_string(),
            kind: "Policy".to_string(),
            metadata: PolicyMetadata {
                id: "test".to_string(),
                name: "Test".to_string(),
                description: None,
                tags: None,
                enabled: true,
            },
            rules,
        };
        RuleSnapshot::from_policies(&[policy]).unwrap()
    }

    fn detected_at() -> DateTime<Utc> {
        "2026-03-02T10:05:00Z".parse().unwrap()
    }

    fn detect_single(
        detector: &AnomalyDetector,
        transaction: &FleetTransaction,
        snapshot: &RuleSnapshot,
    ) -> DetectionOutput {
        let ctx =
            EvaluationContext::new(transaction, &[], chrono::Duration::hours(24), &NoRegions);
        detector.detect(&ctx, snapshot, detected_at())
    }

    struct StaticProvider;

    impl ContextProvider for StaticProvider {
        fn history_window(&self, _transaction: &FleetTransaction) -> Vec<FleetTransaction> {
            Vec::new()
        }
        fn regions(&self) -> &dyn RegionOracle {
            &NoRegions
        }
    }

    #[test]
    fn matching_rule_emits_one_pending_draft() {
        let detector = AnomalyDetector::new();
        let snapshot = snapshot_of(vec![amount_gt_rule("high-spend", 1, 500)]);
        let transaction = txn("t1", 650);

        let output = detect_single(&detector, &transaction, &snapshot);
        assert_eq!(output.drafts.len(), 1);
        let draft = &output.drafts[0];
        assert_eq!(draft.anomaly_type, AnomalyType::HighSpend);
        assert_eq!(draft.reason, "amount 650 exceeds 500");
        assert_eq!(draft.status, FeedbackStatus::PendingReview);
        assert_eq!(draft.idempotency_key(), ("t1", "high-spend"));
    }

    #[test]
    fn non_matching_rule_emits_nothing() {
        let detector = AnomalyDetector::new();
        let snapshot = snapshot_of(vec![amount_gt_rule("high-spend", 1, 500)]);
        let transaction = txn("t2", 100);

        let output = detect_single(&detector, &transaction, &snapshot);
        assert!(output.drafts.is_empty());
        assert!(output.effects.is_empty());
        assert!(output.skipped_rules.is_empty());
    }

    #[test]
    fn all_matching_rules_fire_in_priority_order() {
        let detector = AnomalyDetector::new();
        let snapshot = snapshot_of(vec![
            amount_gt_rule("r-late", 9, 100),
            amount_gt_rule("r-early", 1, 200),
            amount_gt_rule("r-mid", 5, 300),
        ]);
        let transaction = txn("t1", 650);

        let output = detect_single(&detector, &transaction, &snapshot);
        let order: Vec<&str> = output.drafts.iter().map(|d| d.rule_id.as_str()).collect();
        assert_eq!(order, vec!["r-early", "r-mid", "r-late"]);
    }

    #[test]
    fn disabled_and_other_kind_rules_ignored() {
        let detector = AnomalyDetector::new();
        let mut disabled = amount_gt_rule("r-off", 1, 100);
        disabled.enabled = false;
        let mut fuel_only = amount_gt_rule("r-fuel", 1, 100);
        fuel_only.applies_to = TransactionKind::Fuel;
        let snapshot = snapshot_of(vec![disabled, fuel_only, amount_gt_rule("r-on", 2, 100)]);

        let output = detect_single(&detector, &txn("t1", 650), &snapshot);
        let fired: Vec<&str> = output.drafts.iter().map(|d| d.rule_id.as_str()).collect();
        assert_eq!(fired, vec!["r-on"]);
    }

    #[test]
    fn failing_rule_is_skipped_others_still_fire() {
        let detector = AnomalyDetector::new();
        let mut broken = amount_gt_rule("r-broken", 1, 100);
        broken.condition = Condition::Attribute(AttributeCheck {
            property: PropertyName::OdometerReading, // absent on the txn
            op: ComparisonOp::Gt,
            threshold: Threshold::number(Decimal::from(1)),
            optional: false,
        });
        let snapshot = snapshot_of(vec![broken, amount_gt_rule("r-good", 2, 100)]);

        let output = detect_single(&detector, &txn("t1", 650), &snapshot);
        assert_eq!(output.skipped_rules.len(), 1);
        assert_eq!(output.skipped_rules[0].rule_id, "r-broken");
        assert_eq!(output.drafts.len(), 1);
        assert_eq!(output.drafts[0].rule_id, "r-good");
    }

    #[test]
    fn template_failure_drops_action_keeps_rule() {
        let detector = AnomalyDetector::new();
        let mut rule = amount_gt_rule("r1", 1, 100);
        rule.actions = vec![
            Action::Notify {
                channel: NotifyChannel::Email,
                // references a field the transaction does not carry
                template: "driver {{ driver_id }}".to_string(),
                role: "fleet_manager".to_string(),
            },
            Action::CreateAnomaly {
                anomaly_type: AnomalyType::HighSpend,
                reason_template: "amount {{ amount }} too high".to_string(),
            },
        ];
        let snapshot = snapshot_of(vec![rule]);

        let output = detect_single(&detector, &txn("t1", 650), &snapshot);
        assert_eq!(output.dropped_actions.len(), 1);
        assert_eq!(output.dropped_actions[0].action, "notify");
        // The create_anomaly action after the dropped one still resolved.
        assert_eq!(output.drafts.len(), 1);
    }

    #[test]
    fn mixed_actions_split_into_drafts_and_effects() {
        let detector = AnomalyDetector::new();
        let mut rule = amount_gt_rule("r1", 1, 100);
        rule.actions.push(Action::Notify {
            channel: NotifyChannel::Webhook,
            template: "rule {{ rule.id }}".to_string(),
            role: "reviewer".to_string(),
        });
        rule.actions.push(Action::UpdateStatus {
            target_property: "review_state".to_string(),
            new_value: "flagged".to_string(),
        });
        let snapshot = snapshot_of(vec![rule]);

        let output = detect_single(&detector, &txn("t1", 650), &snapshot);
        assert_eq!(output.drafts.len(), 1);
        assert_eq!(output.effects.len(), 2);
    }

    #[test]
    fn detection_is_deterministic() {
        let detector = AnomalyDetector::new();
        let snapshot = snapshot_of(vec![
            amount_gt_rule("r-a", 1, 100),
            amount_gt_rule("r-b", 1, 200),
        ]);
        let transaction = txn("t1", 650);

        let first = detect_single(&detector, &transaction, &snapshot);
        let second = detect_single(&detector, &transaction, &snapshot);
        assert_eq!(first, second);
    }

    #[test]
    fn batch_outputs_follow_input_order() {
        let detector = AnomalyDetector::new();
        let snapshot = snapshot_of(vec![amount_gt_rule("r1", 1, 500)]);
        let transactions = vec![txn("t1", 650), txn("t2", 100), txn("t3", 900)];
        let cancel = AtomicBool::new(false);

        let outcome = detector.detect_batch(
            &transactions,
            &snapshot,
            &StaticProvider,
            detected_at(),
            &cancel,
            false,
        );
        assert!(!outcome.cancelled);
        let ids: Vec<&str> = outcome
            .outputs
            .iter()
            .map(|o| o.transaction_id.as_str())
            .collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
        assert_eq!(outcome.outputs[0].drafts.len(), 1);
        assert_eq!(outcome.outputs[1].drafts.len(), 0);
        assert_eq!(outcome.outputs[2].drafts.len(), 1);
    }

    #[test]
    fn parallel_batch_matches_sequential() {
        let detector = AnomalyDetector::new();
        let snapshot = snapshot_of(vec![
            amount_gt_rule("r-a", 1, 100),
            amount_gt_rule("r-b", 2, 500),
        ]);
        let transactions: Vec<FleetTransaction> =
            (0..32).map(|i| txn(&format!("t{}", i), 50 + i * 40)).collect();
        let cancel = AtomicBool::new(false);

        let sequential = detector.detect_batch(
            &transactions,
            &snapshot,
            &StaticProvider,
            detected_at(),
            &cancel,
            false,
        );
        let parallel = detector.detect_batch(
            &transactions,
            &snapshot,
            &StaticProvider,
            detected_at(),
            &cancel,
            true,
        );
        assert_eq!(sequential.outputs, parallel.outputs);
    }

    #[test]
    fn pre_set_cancel_processes_nothing() {
        let detector = AnomalyDetector::new();
        let snapshot = snapshot_of(vec![amount_gt_rule("r1", 1, 500)]);
        let transactions = vec![txn("t1", 650), txn("t2", 700)];
        let cancel = AtomicBool::new(true);

        let outcome = detector.detect_batch(
            &transactions,
            &snapshot,
            &StaticProvider,
            detected_at(),
            &cancel,
            false,
        );
        assert!(outcome.cancelled);
        assert!(outcome.outputs.is_empty());
    }

    #[test]
    fn audit_records_skipped_rules() {
        let audit = Arc::new(AuditLog::new());
        let detector = AnomalyDetector::with_audit(audit.clone());
        let mut broken = amount_gt_rule("r-broken", 1, 100);
        broken.condition = Condition::Attribute(AttributeCheck {
            property: PropertyName::OdometerReading,
            op: ComparisonOp::Gt,
            threshold: Threshold::number(Decimal::from(1)),
            optional: false,
        });
        let snapshot = snapshot_of(vec![broken]);

        detect_single(&detector, &txn("t1", 650), &snapshot);
        let entries = audit.entries_for("r-broken", AuditLevel::Error, None, 10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].phase, DetectionPhase::Evaluation);
    }
}
