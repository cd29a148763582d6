//! Recognized transaction properties and their runtime values.
//!
//! Rule conditions refer to properties by name. The set of names is a closed
//! enum checked when rules are loaded, so a typo in a rule file is rejected
//! up front instead of surfacing as a missing value mid-evaluation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::transaction::TransactionKind;

/// A geographic point, used by region-based conditions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Every property a condition may reference.
///
/// Intrinsic properties come straight off the transaction; derived ones
/// (hour of day, price per unit, history distances) are computed by the
/// evaluation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyName {
    Amount,
    Currency,
    MerchantName,
    MerchantCategory,
    VehicleId,
    DriverId,
    OdometerReading,
    Location,
    FuelType,
    FuelVolume,
    PricePerUnit,
    MaintenanceType,
    MlScore,
    MlLabel,
    // Derived from the timestamp
    HourOfDay,
    DayOfWeek,
    IsWeekend,
    IsBusinessHours,
    // Derived from the caller-supplied history window
    DaysSinceLastTransaction,
    SecondsSinceLastTransaction,
    DistanceSinceLastTransaction,
    TransactionsInWindow,
}

/// The shape of values a property resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Text,
    Flag,
    Point,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Number => write!(f, "number"),
            ValueKind::Text => write!(f, "text"),
            ValueKind::Flag => write!(f, "flag"),
            ValueKind::Point => write!(f, "point"),
        }
    }
}

impl PropertyName {
    /// The value shape this property resolves to.
    pub fn value_kind(self) -> ValueKind {
        use PropertyName::*;
        match self {
            Amount | OdometerReading | FuelVolume | PricePerUnit | MlScore | HourOfDay
            | DayOfWeek | DaysSinceLastTransaction | SecondsSinceLastTransaction
            | DistanceSinceLastTransaction | TransactionsInWindow => ValueKind::Number,
            Currency | MerchantName | MerchantCategory | VehicleId | DriverId | FuelType
            | MaintenanceType | MlLabel => ValueKind::Text,
            IsWeekend | IsBusinessHours => ValueKind::Flag,
            Location => ValueKind::Point,
        }
    }

    /// Whether a rule targeting `kind` may reference this property.
    ///
    /// Fuel metrics only exist on fuel purchases, maintenance type only on
    /// maintenance work; everything else is kind-independent.
    pub fn applies_to(self, kind: TransactionKind) -> bool {
        use PropertyName::*;
        match self {
            FuelType | FuelVolume | PricePerUnit => kind == TransactionKind::Fuel,
            MaintenanceType => kind == TransactionKind::Maintenance,
            _ => true,
        }
    }

    /// Whether the property can legitimately be absent on a valid transaction.
    ///
    /// Absence of a non-optional property is a rule configuration error;
    /// absence of one of these is just a fact about the record.
    pub fn inherently_optional(self) -> bool {
        use PropertyName::*;
        matches!(
            self,
            VehicleId
                | DriverId
                | OdometerReading
                | Location
                | FuelType
                | FuelVolume
                | PricePerUnit
                | MaintenanceType
                | MlScore
                | MlLabel
                | DaysSinceLastTransaction
                | SecondsSinceLastTransaction
                | DistanceSinceLastTransaction
        )
    }

    /// Canonical snake_case name as used in rule files.
    pub fn as_str(self) -> &'static str {
        use PropertyName::*;
        match self {
            Amount => "amount",
            Currency => "currency",
            MerchantName => "merchant_name",
            MerchantCategory => "merchant_category",
            VehicleId => "vehicle_id",
            DriverId => "driver_id",
            OdometerReading => "odometer_reading",
            Location => "location",
            FuelType => "fuel_type",
            FuelVolume => "fuel_volume",
            PricePerUnit => "price_per_unit",
            MaintenanceType => "maintenance_type",
            MlScore => "ml_score",
            MlLabel => "ml_label",
            HourOfDay => "hour_of_day",
            DayOfWeek => "day_of_week",
            IsWeekend => "is_weekend",
            IsBusinessHours => "is_business_hours",
            DaysSinceLastTransaction => "days_since_last_transaction",
            SecondsSinceLastTransaction => "seconds_since_last_transaction",
            DistanceSinceLastTransaction => "distance_since_last_transaction",
            TransactionsInWindow => "transactions_in_window",
        }
    }
}

impl std::fmt::Display for PropertyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PropertyName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use PropertyName::*;
        match s {
            "amount" => Ok(Amount),
            "currency" => Ok(Currency),
            "merchant_name" => Ok(MerchantName),
            "merchant_category" => Ok(MerchantCategory),
            "vehicle_id" => Ok(VehicleId),
            "driver_id" => Ok(DriverId),
            "odometer_reading" => Ok(OdometerReading),
            "location" => Ok(Location),
            "fuel_type" => Ok(FuelType),
            "fuel_volume" => Ok(FuelVolume),
            "price_per_unit" => Ok(PricePerUnit),
            "maintenance_type" => Ok(MaintenanceType),
            "ml_score" => Ok(MlScore),
            "ml_label" => Ok(MlLabel),
            "hour_of_day" => Ok(HourOfDay),
            "day_of_week" => Ok(DayOfWeek),
            "is_weekend" => Ok(IsWeekend),
            "is_business_hours" => Ok(IsBusinessHours),
            "days_since_last_transaction" => Ok(DaysSinceLastTransaction),
            "seconds_since_last_transaction" => Ok(SecondsSinceLastTransaction),
            "distance_since_last_transaction" => Ok(DistanceSinceLastTransaction),
            "transactions_in_window" => Ok(TransactionsInWindow),
            other => Err(format!("unknown property name: '{}'", other)),
        }
    }
}

/// A resolved property value.
///
/// All numerics resolve to `Decimal` so the evaluator never compares
/// through floating point, including the ML score (converted once here).
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Number(Decimal),
    Text(String),
    Flag(bool),
    Point(GeoPoint),
}

impl PropertyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::Number(_) => ValueKind::Number,
            PropertyValue::Text(_) => ValueKind::Text,
            PropertyValue::Flag(_) => ValueKind::Flag,
            PropertyValue::Point(_) => ValueKind::Point,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            PropertyValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<GeoPoint> {
        match self {
            PropertyValue::Point(p) => Some(*p),
            _ => None,
        }
    }
}
