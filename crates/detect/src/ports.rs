//! Collaborator ports consumed and exposed by the detection engine.
//!
//! All I/O lives behind these traits. They are synchronous: the engine has
//! no suspension points, and callers pick their own concurrency wrapper.

use fleetsight_core::{AnomalyDraft, FleetTransaction, GeoPoint};
use fleetsight_rules::loader::PolicyLoader;
use fleetsight_rules::snapshot::RuleSnapshot;

use crate::dispatcher::EffectRequest;

// ── Consumed ports ──────────────────────────────────────────────────

/// Source of the active rule set.
///
/// Implementations must return a self-consistent, immutable snapshot: the
/// engine captures it once per batch and never observes later edits.
pub trait RuleRepository {
    fn load_active_rules(&self) -> Result<RuleSnapshot, RepositoryError>;
}

/// Rule repository failure. Fatal to the batch that requested the
/// snapshot; no partial rule set is ever used.
#[derive(Debug, thiserror::Error)]
#[error("rule repository unavailable: {0}")]
pub struct RepositoryError(pub String);

/// Supplies per-transaction evaluation inputs the engine never fetches
/// itself: the historical window and the geometry oracle.
pub trait ContextProvider: Send + Sync {
    /// Prior transactions relevant to `transaction` (same vehicle/driver
    /// scope, bounded lookback). May be empty.
    fn history_window(&self, transaction: &FleetTransaction) -> Vec<FleetTransaction>;

    /// Window length for `transactions_in_window` counting.
    fn frequency_window(&self) -> chrono::Duration {
        chrono::Duration::hours(24)
    }

    fn regions(&self) -> &dyn RegionOracle;
}

/// Black-box point-in-region predicate backed by a geometry collaborator.
pub trait RegionOracle: Send + Sync {
    fn contains(&self, region_ref: &str, point: GeoPoint) -> Result<bool, RegionLookupError>;
}

#[derive(Debug, thiserror::Error)]
#[error("region '{region}': {message}")]
pub struct RegionLookupError {
    pub region: String,
    pub message: String,
}

/// Oracle for deployments without a geometry collaborator: every lookup
/// fails, which turns region conditions into rule-level errors instead of
/// silently matching or not matching.
pub struct NoRegions;

impl RegionOracle for NoRegions {
    fn contains(&self, region_ref: &str, _point: GeoPoint) -> Result<bool, RegionLookupError> {
        Err(RegionLookupError {
            region: region_ref.to_string(),
            message: "no geometry collaborator configured".to_string(),
        })
    }
}

// ── Exposed ports ───────────────────────────────────────────────────

/// Accepts drafts for idempotent upsert keyed on (transaction id, rule id).
///
/// Uniqueness on that pair is the sink's contract; it is what makes
/// re-detection after a retry produce no duplicate anomalies.
pub trait PersistenceSink {
    fn upsert_drafts(&self, drafts: &[AnomalyDraft]) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
#[error("persistence sink rejected drafts: {0}")]
pub struct SinkError(pub String);

/// Accepts non-anomaly effect requests for asynchronous delivery.
/// Delivery failures are the gateway's concern; the engine never retries.
pub trait EffectGateway {
    fn deliver(&self, effect: &EffectRequest) -> Result<(), GatewayError>;
}

#[derive(Debug, thiserror::Error)]
#[error("effect gateway refused request: {0}")]
pub struct GatewayError(pub String);

// ── Filesystem-backed repository ────────────────────────────────────

/// [`RuleRepository`] over a policy directory.
pub struct DirectoryRuleRepository {
    loader: PolicyLoader,
}

impl DirectoryRuleRepository {
    pub fn new(loader: PolicyLoader) -> Self {
        Self { loader }
    }

    /// Repository rooted at the configured policies directory.
    pub fn from_config(config: &fleetsight_core::EngineConfig) -> Self {
        Self::new(PolicyLoader::new(config.rules_dir.clone()))
    }
}

impl RuleRepository for DirectoryRuleRepository {
    fn load_active_rules(&self) -> Result<RuleSnapshot, RepositoryError> {
        let load = self
            .loader
            .load_snapshot()
            .map_err(|e| RepositoryError(e.to_string()))?;
        Ok(load.snapshot)
    }
}
