//! Batch orchestration: snapshot load, detection, and hand-off to sinks.
//!
//! One `run_batch` call is one detection pass: capture a consistent rule
//! snapshot, map detection over the transactions, upsert the drafts, and
//! forward the remaining effects. Repository and sink failures are fatal
//! to the batch only; gateway failures are counted and left to the
//! gateway's own retry story.

use std::sync::atomic::AtomicBool;

use chrono::Utc;
use fleetsight_core::FleetTransaction;
use tracing::{info, warn};

use crate::detector::AnomalyDetector;
use crate::ports::{ContextProvider, EffectGateway, PersistenceSink, RuleRepository};
use crate::ports::{RepositoryError, SinkError};

/// Batch-fatal failures.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Persistence(#[from] SinkError),
}

/// Summary of one detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub transactions_processed: usize,
    pub drafts_upserted: usize,
    pub effects_delivered: usize,
    pub effects_failed: usize,
    pub rules_skipped: usize,
    pub actions_dropped: usize,
    pub cancelled: bool,
}

/// Wires the detector to its collaborators for batch runs.
pub struct DetectionEngine<'a> {
    repository: &'a dyn RuleRepository,
    provider: &'a dyn ContextProvider,
    sink: &'a dyn PersistenceSink,
    gateway: &'a dyn EffectGateway,
    detector: AnomalyDetector,
    parallel: bool,
}

impl<'a> DetectionEngine<'a> {
    pub fn new(
        repository: &'a dyn RuleRepository,
        provider: &'a dyn ContextProvider,
        sink: &'a dyn PersistenceSink,
        gateway: &'a dyn EffectGateway,
        detector: AnomalyDetector,
        parallel: bool,
    ) -> Self {
        Self {
            repository,
            provider,
            sink,
            gateway,
            detector,
            parallel,
        }
    }

    /// Engine honoring the configured parallelism toggle.
    pub fn with_config(
        repository: &'a dyn RuleRepository,
        provider: &'a dyn ContextProvider,
        sink: &'a dyn PersistenceSink,
        gateway: &'a dyn EffectGateway,
        detector: AnomalyDetector,
        config: &fleetsight_core::EngineConfig,
    ) -> Self {
        Self::new(
            repository,
            provider,
            sink,
            gateway,
            detector,
            config.parallel_detection,
        )
    }

    /// Run one detection pass over a batch of transactions.
    pub fn run_batch(
        &self,
        transactions: &[FleetTransaction],
        cancel: &AtomicBool,
    ) -> Result<BatchReport, BatchError> {
        // One consistent snapshot per batch; a repository failure aborts
        // before any evaluation starts.
        let snapshot = self.repository.load_active_rules()?;
        let detected_at = Utc::now();

        let outcome = self.detector.detect_batch(
            transactions,
            &snapshot,
            self.provider,
            detected_at,
            cancel,
            self.parallel,
        );

        let drafts: Vec<_> = outcome
            .outputs
            .iter()
            .flat_map(|o| o.drafts.iter().cloned())
            .collect();
        if !drafts.is_empty() {
            self.sink.upsert_drafts(&drafts)?;
        }

        let mut effects_delivered = 0;
        let mut effects_failed = 0;
        for effect in outcome.outputs.iter().flat_map(|o| o.effects.iter()) {
            match self.gateway.deliver(effect) {
                Ok(()) => effects_delivered += 1,
                Err(e) => {
                    // Delivery is the gateway's concern; never retried here.
                    warn!(error = %e, "effect delivery refused");
                    effects_failed += 1;
                }
            }
        }

        let report = BatchReport {
            transactions_processed: outcome.outputs.len(),
            drafts_upserted: drafts.len(),
            effects_delivered,
            effects_failed,
            rules_skipped: outcome.outputs.iter().map(|o| o.skipped_rules.len()).sum(),
            actions_dropped: outcome
                .outputs
                .iter()
                .map(|o| o.dropped_actions.len())
                .sum(),
            cancelled: outcome.cancelled,
        };
        info!(
            processed = report.transactions_processed,
            drafts = report.drafts_upserted,
            effects = report.effects_delivered,
            skipped = report.rules_skipped,
            cancelled = report.cancelled,
            "detection batch complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::EffectRequest;
    use crate::ports::{GatewayError, NoRegions, RegionOracle};
    use fleetsight_core::{AnomalyDraft, AnomalyType, PropertyName, TransactionKind};
    use fleetsight_rules::schema::{
        Action, AttributeCheck, ComparisonOp, Condition, NotifyChannel, Policy, PolicyMetadata,
        Rule, Threshold,
    };
    use fleetsight_rules::snapshot::RuleSnapshot;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    struct FixedRepository(Option<RuleSnapshot>);

    impl RuleRepository for FixedRepository {
        fn load_active_rules(&self) -> Result<RuleSnapshot, RepositoryError> {
            self.0
                .clone()
                .ok_or_else(|| RepositoryError("store offline".to_string()))
        }
    }

    struct EmptyProvider;

    impl ContextProvider for EmptyProvider {
        fn history_window(&self, _transaction: &FleetTransaction) -> Vec<FleetTransaction> {
            Vec::new()
        }
        fn regions(&self) -> &dyn RegionOracle {
            &NoRegions
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        drafts: Mutex<Vec<AnomalyDraft>>,
    }

    impl PersistenceSink for RecordingSink {
        fn upsert_drafts(&self, drafts: &[AnomalyDraft]) -> Result<(), SinkError> {
            self.drafts
                .lock()
                .expect("sink lock poisoned")
                .extend_from_slice(drafts);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingGateway {
        effects: Mutex<Vec<EffectRequest>>,
        refuse: bool,
    }

    impl EffectGateway for RecordingGateway {
        fn deliver(&self, effect: &EffectRequest) -> Result<(), GatewayError> {
            if self.refuse {
                return Err(GatewayError("queue full".to_string()));
            }
            self.effects
                .lock()
                .expect("gateway lock poisoned")
                .push(effect.clone());
            Ok(())
        }
    }

    fn txn(id: &str, amount: i64) -> FleetTransaction {
        FleetTransaction {
            transaction_id: id.to_string(),
            uuid: None,
            kind: TransactionKind::General,
            timestamp: "2026-03-02T10:00:00Z".parse().unwrap(),
            amount: Decimal::from(amount),
            currency: "USD".to_string(),
            merchant_name: "Acme".to_string(),
            merchant_category: "retail".to_string(),
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

    fn snapshot() -> RuleSnapshot {
        let rule = Rule {
            id: "high-spend".to_string(),
            description: None,
            priority: 1,
            enabled: true,
            applies_to: TransactionKind::General,
            condition: Condition::Attribute(AttributeCheck {
                property: PropertyName::Amount,
                op: ComparisonOp::Gt,
                threshold: Threshold::number(Decimal::from(500)),
                optional: false,
            }),
            actions: vec![
                Action::CreateAnomaly {
                    anomaly_type: AnomalyType::HighSpend,
                    reason_template: "amount {{ amount }} exceeds 500".to_string(),
                },
                Action::Notify {
                    channel: NotifyChannel::Email,
                    template: "rule {{ rule.id }} fired".to_string(),
                    role: "fleet_manager".to_string(),
                },
            ],
        };
        let policy = Policy {
            api_version: "v1".to_string(),
            kind: "Policy".to_string(),
            metadata: PolicyMetadata {
                id: "p1".to_string(),
                name: "P1".to_string(),
                description: None,
                tags: None,
                enabled: true,
            },
            rules: vec![rule],
        };
        RuleSnapshot::from_policies(&[policy]).unwrap()
    }

    #[test]
    fn batch_routes_drafts_and_effects() {
        let repository = FixedRepository(Some(snapshot()));
        let sink = RecordingSink::default();
        let gateway = RecordingGateway::default();
        let engine = DetectionEngine::new(
            &repository,
            &EmptyProvider,
            &sink,
            &gateway,
            AnomalyDetector::new(),
            false,
        );

        let report = engine
            .run_batch(&[txn("t1", 650), txn("t2", 100)], &AtomicBool::new(false))
            .unwrap();

        assert_eq!(report.transactions_processed, 2);
        assert_eq!(report.drafts_upserted, 1);
        assert_eq!(report.effects_delivered, 1);
        assert!(!report.cancelled);

        let drafts = sink.drafts.lock().unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].transaction_id, "t1");

        let effects = gateway.effects.lock().unwrap();
        assert!(matches!(effects[0], EffectRequest::Notify(_)));
    }

    #[test]
    fn repository_failure_is_batch_fatal() {
        let repository = FixedRepository(None);
        let sink = RecordingSink::default();
        let gateway = RecordingGateway::default();
        let engine = DetectionEngine::new(
            &repository,
            &EmptyProvider,
            &sink,
            &gateway,
            AnomalyDetector::new(),
            false,
        );

        let err = engine
            .run_batch(&[txn("t1", 650)], &AtomicBool::new(false))
            .unwrap_err();
        assert!(matches!(err, BatchError::Repository(_)));
        assert!(sink.drafts.lock().unwrap().is_empty());
    }

    #[test]
    fn gateway_refusal_counted_not_fatal() {
        let repository = FixedRepository(Some(snapshot()));
        let sink = RecordingSink::default();
        let gateway = RecordingGateway {
            refuse: true,
            ..Default::default()
        };
        let engine = DetectionEngine::new(
            &repository,
            &EmptyProvider,
            &sink,
            &gateway,
            AnomalyDetector::new(),
            false,
        );

        let report = engine
            .run_batch(&[txn("t1", 650)], &AtomicBool::new(false))
            .unwrap();
        assert_eq!(report.effects_failed, 1);
        assert_eq!(report.drafts_upserted, 1);
    }

    #[test]
    fn cancelled_batch_reports_partial_progress() {
        let repository = FixedRepository(Some(snapshot()));
        let sink = RecordingSink::default();
        let gateway = RecordingGateway::default();
        let engine = DetectionEngine::new(
            &repository,
            &EmptyProvider,
            &sink,
            &gateway,
            AnomalyDetector::new(),
            false,
        );

        let report = engine
            .run_batch(&[txn("t1", 650)], &AtomicBool::new(true))
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.transactions_processed, 0);
    }
}
