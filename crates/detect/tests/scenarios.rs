//! End-to-end detection scenarios: YAML policies through snapshot,
//! evaluation, and dispatch.

use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Utc};
use fleetsight_core::{
    AnomalyType, FeedbackStatus, FleetTransaction, FuelDetail, GeoPoint, TransactionKind,
};
use fleetsight_detect::ports::{ContextProvider, RegionLookupError, RegionOracle};
use fleetsight_detect::{AnomalyDetector, EvaluationContext};
use fleetsight_rules::schema::Policy;
use fleetsight_rules::snapshot::RuleSnapshot;
use rust_decimal::Decimal;

const SPEND_POLICY: &str = r#"
apiVersion: v1
kind: Policy
metadata:
  id: spend-controls
  name: Spend Controls
rules:
  - id: high-spend-500
    priority: 1
    applies_to: general
    condition:
      attribute:
        property: amount
        op: gt
        threshold:
          value: 500
    actions:
      - create_anomaly:
          anomaly_type: high_spend
          reason_template: "amount {{ amount }} exceeds 500"
"#;

const FLEET_POLICY: &str = r#"
apiVersion: v1
kind: Policy
metadata:
  id: fleet-watch
  name: Fleet Watch
rules:
  - id: frequent-fueling
    priority: 2
    applies_to: fuel
    condition:
      all:
        - attribute:
            property: transactions_in_window
            op: ge
            threshold:
              value: 3
        - attribute:
            property: fuel_volume
            op: gt
            threshold:
              value: 10
    actions:
      - create_anomaly:
          anomaly_type: frequency
          reason_template: "vehicle {{ vehicle_id }} refueled repeatedly within a day"
  - id: offsite-fueling
    priority: 1
    applies_to: fuel
    condition:
      not:
        attribute:
          property: location
          op: within_region
          threshold:
            value:
              region: depot-geofence
    actions:
      - create_anomaly:
          anomaly_type: location
          reason_template: "fuel purchase away from depot by {{ vehicle_id }}"
      - notify:
          channel: webhook
          template: "offsite fueling: {{ transaction_id }}"
          role: fleet_manager
"#;

fn snapshot(yaml: &str) -> RuleSnapshot {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();
    let policy = Policy::from_yaml(yaml).unwrap();
    RuleSnapshot::from_policies(&[policy]).unwrap()
}

fn detected_at() -> DateTime<Utc> {
    "2026-03-02T12:00:00Z".parse().unwrap()
}

fn general_txn(id: &str, amount: i64) -> FleetTransaction {
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

fn fuel_txn(id: &str, ts: &str, vehicle: &str) -> FleetTransaction {
    FleetTransaction {
        transaction_id: id.to_string(),
        uuid: None,
        kind: TransactionKind::Fuel,
        timestamp: ts.parse().unwrap(),
        amount: Decimal::from(80),
        currency: "USD".to_string(),
        merchant_name: "Roadside Fuel".to_string(),
        merchant_category: "fuel_station".to_string(),
        latitude: Some(14.6),
        longitude: Some(121.0),
        vehicle_id: Some(vehicle.to_string()),
        driver_id: Some("drv-1".to_string()),
        odometer_reading: Some(50_000),
        fuel: Some(FuelDetail {
            fuel_type: "diesel".to_string(),
            fuel_volume: Decimal::from(35),
            volume_unit: "liter".to_string(),
        }),
        maintenance: None,
        ml: None,
    }
}

/// Geometry stub: inside the depot geofence or not, fixed per instance.
struct FixedRegionAnswer(bool);

impl RegionOracle for FixedRegionAnswer {
    fn contains(&self, _region: &str, _point: GeoPoint) -> Result<bool, RegionLookupError> {
        Ok(self.0)
    }
}

struct Provider {
    history: Vec<FleetTransaction>,
    regions: FixedRegionAnswer,
}

impl ContextProvider for Provider {
    fn history_window(&self, _transaction: &FleetTransaction) -> Vec<FleetTransaction> {
        self.history.clone()
    }
    fn regions(&self) -> &dyn RegionOracle {
        &self.regions
    }
}

#[test]
fn high_spend_transaction_yields_one_pending_draft() {
    let detector = AnomalyDetector::new();
    let snapshot = snapshot(SPEND_POLICY);
    let txn = general_txn("t1", 650);
    let oracle = FixedRegionAnswer(true);
    let ctx = EvaluationContext::new(&txn, &[], chrono::Duration::hours(24), &oracle);

    let output = detector.detect(&ctx, &snapshot, detected_at());

    assert_eq!(output.drafts.len(), 1);
    let draft = &output.drafts[0];
    assert_eq!(draft.anomaly_type, AnomalyType::HighSpend);
    assert_eq!(draft.reason, "amount 650 exceeds 500");
    assert_eq!(draft.status, FeedbackStatus::PendingReview);
}

#[test]
fn modest_transaction_yields_no_drafts() {
    let detector = AnomalyDetector::new();
    let snapshot = snapshot(SPEND_POLICY);
    let txn = general_txn("t2", 100);
    let oracle = FixedRegionAnswer(true);
    let ctx = EvaluationContext::new(&txn, &[], chrono::Duration::hours(24), &oracle);

    let output = detector.detect(&ctx, &snapshot, detected_at());
    assert!(output.drafts.is_empty());
}

#[test]
fn frequency_rule_fires_with_dense_history() {
    let detector = AnomalyDetector::new();
    let snapshot = snapshot(FLEET_POLICY);
    let txn = fuel_txn("t-now", "2026-03-02T18:00:00Z", "veh-1");
    let provider = Provider {
        history: vec![
            fuel_txn("t-1", "2026-03-02T06:00:00Z", "veh-1"),
            fuel_txn("t-2", "2026-03-02T09:00:00Z", "veh-1"),
            fuel_txn("t-3", "2026-03-02T15:00:00Z", "veh-1"),
            fuel_txn("t-other", "2026-03-02T15:00:00Z", "veh-9"),
        ],
        regions: FixedRegionAnswer(true), // at depot, location rule silent
    };

    let outcome = detector.detect_batch(
        &[txn],
        &snapshot,
        &provider,
        detected_at(),
        &AtomicBool::new(false),
        false,
    );

    let drafts = &outcome.outputs[0].drafts;
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].rule_id, "frequent-fueling");
    assert_eq!(drafts[0].anomaly_type, AnomalyType::Frequency);
    assert_eq!(
        drafts[0].reason,
        "vehicle veh-1 refueled repeatedly within a day"
    );
}

#[test]
fn offsite_fueling_fires_location_rule_first() {
    let detector = AnomalyDetector::new();
    let snapshot = snapshot(FLEET_POLICY);
    let txn = fuel_txn("t-away", "2026-03-02T18:00:00Z", "veh-1");
    let provider = Provider {
        history: vec![
            fuel_txn("t-1", "2026-03-02T06:00:00Z", "veh-1"),
            fuel_txn("t-2", "2026-03-02T09:00:00Z", "veh-1"),
            fuel_txn("t-3", "2026-03-02T15:00:00Z", "veh-1"),
        ],
        regions: FixedRegionAnswer(false), // away from depot
    };

    let outcome = detector.detect_batch(
        &[txn],
        &snapshot,
        &provider,
        detected_at(),
        &AtomicBool::new(false),
        false,
    );

    let output = &outcome.outputs[0];
    // Both rules match; drafts follow priority order (offsite-fueling is 1).
    let fired: Vec<&str> = output.drafts.iter().map(|d| d.rule_id.as_str()).collect();
    assert_eq!(fired, vec!["offsite-fueling", "frequent-fueling"]);
    // The notify action became an effect request, not a draft.
    assert_eq!(output.effects.len(), 1);
}

#[test]
fn repeated_detection_is_identical() {
    let detector = AnomalyDetector::new();
    let snapshot = snapshot(FLEET_POLICY);
    let transactions = vec![
        fuel_txn("t-a", "2026-03-02T18:00:00Z", "veh-1"),
        fuel_txn("t-b", "2026-03-02T19:00:00Z", "veh-2"),
    ];
    let provider = Provider {
        history: Vec::new(),
        regions: FixedRegionAnswer(false),
    };

    let first = detector.detect_batch(
        &transactions,
        &snapshot,
        &provider,
        detected_at(),
        &AtomicBool::new(false),
        false,
    );
    let second = detector.detect_batch(
        &transactions,
        &snapshot,
        &provider,
        detected_at(),
        &AtomicBool::new(false),
        false,
    );

    assert_eq!(first.outputs, second.outputs);
}
