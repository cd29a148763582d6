//! Per-transaction evaluation context.
//!
//! Resolves property names to values for one transaction, deriving time
//! features from the timestamp and history features from a caller-supplied
//! window of prior transactions. The context never fetches anything: the
//! history window and geometry oracle are injected by the context provider.

use chrono::{Datelike, Timelike};
use fleetsight_core::{FleetTransaction, PropertyName, PropertyValue};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::ports::RegionOracle;

/// Read-only view of one transaction plus its evaluation inputs.
pub struct EvaluationContext<'a> {
    transaction: &'a FleetTransaction,
    history: &'a [FleetTransaction],
    frequency_window: chrono::Duration,
    regions: &'a dyn RegionOracle,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        transaction: &'a FleetTransaction,
        history: &'a [FleetTransaction],
        frequency_window: chrono::Duration,
        regions: &'a dyn RegionOracle,
    ) -> Self {
        Self {
            transaction,
            history,
            frequency_window,
            regions,
        }
    }

    pub fn transaction(&self) -> &FleetTransaction {
        self.transaction
    }

    pub fn regions(&self) -> &dyn RegionOracle {
        self.regions
    }

    /// Resolve a property to its value on this transaction.
    ///
    /// `None` means the property is legitimately absent (no location, no
    /// fuel detail, empty history). The evaluator decides whether absence
    /// is a matchable fact or a rule configuration error.
    pub fn property(&self, name: PropertyName) -> Option<PropertyValue> {
        use PropertyName::*;
        let txn = self.transaction;
        match name {
            Amount => Some(PropertyValue::Number(txn.amount)),
            Currency => Some(PropertyValue::Text(txn.currency.clone())),
            MerchantName => Some(PropertyValue::Text(txn.merchant_name.clone())),
            MerchantCategory => Some(PropertyValue::Text(txn.merchant_category.clone())),
            VehicleId => txn.vehicle_id.clone().map(PropertyValue::Text),
            DriverId => txn.driver_id.clone().map(PropertyValue::Text),
            OdometerReading => txn
                .odometer_reading
                .map(|o| PropertyValue::Number(Decimal::from(o))),
            Location => txn.location().map(PropertyValue::Point),
            FuelType => txn
                .fuel
                .as_ref()
                .map(|f| PropertyValue::Text(f.fuel_type.clone())),
            FuelVolume => txn
                .fuel
                .as_ref()
                .map(|f| PropertyValue::Number(f.fuel_volume)),
            PricePerUnit => txn.price_per_unit().map(PropertyValue::Number),
            MaintenanceType => txn
                .maintenance
                .as_ref()
                .map(|m| PropertyValue::Text(m.maintenance_type.clone())),
            // Converted to decimal once here so comparisons never go
            // through floating point.
            MlScore => txn
                .ml
                .as_ref()
                .and_then(|ml| Decimal::from_f64(ml.score))
                .map(PropertyValue::Number),
            MlLabel => txn.ml.as_ref().map(|ml| PropertyValue::Text(ml.label.clone())),
            HourOfDay => Some(PropertyValue::Number(Decimal::from(
                txn.timestamp.hour(),
            ))),
            DayOfWeek => Some(PropertyValue::Number(Decimal::from(
                txn.timestamp.weekday().num_days_from_monday(),
            ))),
            IsWeekend => Some(PropertyValue::Flag(
                txn.timestamp.weekday().num_days_from_monday() >= 5,
            )),
            IsBusinessHours => {
                let hour = txn.timestamp.hour();
                Some(PropertyValue::Flag((8..18).contains(&hour)))
            }
            DaysSinceLastTransaction => self
                .previous_transaction()
                .map(|prev| {
                    Decimal::from((txn.timestamp - prev.timestamp).num_days())
                })
                .map(PropertyValue::Number),
            SecondsSinceLastTransaction => self
                .previous_transaction()
                .map(|prev| {
                    Decimal::from((txn.timestamp - prev.timestamp).num_seconds())
                })
                .map(PropertyValue::Number),
            DistanceSinceLastTransaction => {
                let current = txn.odometer_reading?;
                let prev = self.previous_transaction()?.odometer_reading?;
                Some(PropertyValue::Number(Decimal::from(
                    current.saturating_sub(prev),
                )))
            }
            TransactionsInWindow => {
                Some(PropertyValue::Number(Decimal::from(self.window_count())))
            }
        }
    }

    /// Most recent prior transaction in the same scope (same vehicle when
    /// the transaction has one, else same driver).
    fn previous_transaction(&self) -> Option<&FleetTransaction> {
        self.scoped_history()
            .filter(|t| t.timestamp < self.transaction.timestamp)
            .max_by_key(|t| t.timestamp)
    }

    /// Prior transactions inside the frequency window.
    fn window_count(&self) -> usize {
        let window_start = self.transaction.timestamp - self.frequency_window;
        self.scoped_history()
            .filter(|t| t.timestamp < self.transaction.timestamp && t.timestamp >= window_start)
            .count()
    }

    fn scoped_history(&self) -> impl Iterator<Item = &'a FleetTransaction> + 'a {
        let vehicle = self.transaction.vehicle_id.as_deref();
        let driver = self.transaction.driver_id.as_deref();
        self.history.iter().filter(move |t| match (vehicle, driver) {
            (Some(v), _) => t.vehicle_id.as_deref() == Some(v),
            (None, Some(d)) => t.driver_id.as_deref() == Some(d),
            (None, None) => true,
        })
    }
}
