//! Fleet transaction records: the immutable input to anomaly detection.
//!
//! Transactions are produced upstream (card feeds, telematics ingest) and
//! consumed read-only by this engine. Kind-specific detail lives in optional
//! structs rather than subtypes, so matching stays exhaustive.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a fleet transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Fuel,
    Maintenance,
    Toll,
    Parking,
    General,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Fuel => write!(f, "fuel"),
            TransactionKind::Maintenance => write!(f, "maintenance"),
            TransactionKind::Toll => write!(f, "toll"),
            TransactionKind::Parking => write!(f, "parking"),
            TransactionKind::General => write!(f, "general"),
        }
    }
}

/// Fuel purchase detail attached to [`TransactionKind::Fuel`] transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelDetail {
    /// Fuel grade or type (e.g., "diesel", "unleaded_95").
    pub fuel_type: String,
    /// Volume purchased, in `volume_unit`.
    pub fuel_volume: Decimal,
    /// Unit for `fuel_volume` (e.g., "liter", "gallon").
    pub volume_unit: String,
}

/// Maintenance detail attached to [`TransactionKind::Maintenance`] transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceDetail {
    /// Description of the work performed (e.g., "oil_change").
    pub maintenance_type: String,
}

/// Optional anomaly signal from an external inference collaborator.
///
/// The engine consumes the score/label as plain input properties; it never
/// trains or runs models itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlSignal {
    pub score: f64,
    pub label: String,
}

/// A recorded financial or operational event for a fleet vehicle or driver.
///
/// Immutable and owned by the caller; the engine never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetTransaction {
    pub transaction_id: String,
    #[serde(default)]
    pub uuid: Option<Uuid>,
    pub kind: TransactionKind,
    pub timestamp: DateTime<Utc>,
    /// Monetary value. Decimal, never a float: rule comparisons are
    /// performed in fixed-point arithmetic.
    pub amount: Decimal,
    /// ISO 4217 currency code (3 uppercase letters).
    pub currency: String,
    pub merchant_name: String,
    pub merchant_category: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub odometer_reading: Option<u32>,
    #[serde(default)]
    pub fuel: Option<FuelDetail>,
    #[serde(default)]
    pub maintenance: Option<MaintenanceDetail>,
    #[serde(default)]
    pub ml: Option<MlSignal>,
}

/// Structural problems in a caller-supplied transaction.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransactionError {
    #[error("transaction id must not be empty")]
    EmptyId,

    #[error("currency '{0}' is not a 3-letter uppercase ISO 4217 code")]
    BadCurrency(String),

    #[error("latitude and longitude must be provided together")]
    UnpairedCoordinates,

    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

impl FleetTransaction {
    /// Check structural invariants the upstream feed is expected to hold.
    ///
    /// Callers admit transactions into a detection batch only after this
    /// passes; the evaluator itself assumes a valid record.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.transaction_id.is_empty() {
            return Err(TransactionError::EmptyId);
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(TransactionError::BadCurrency(self.currency.clone()));
        }
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(TransactionError::LatitudeOutOfRange(lat));
                }
                if !(-180.0..=180.0).contains(&lon) {
                    return Err(TransactionError::LongitudeOutOfRange(lon));
                }
            }
            (None, None) => {}
            _ => return Err(TransactionError::UnpairedCoordinates),
        }
        Ok(())
    }

    /// Geographic point of the transaction, when both coordinates are present.
    pub fn location(&self) -> Option<crate::property::GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                Some(crate::property::GeoPoint { latitude, longitude })
            }
            _ => None,
        }
    }

    /// Price per fuel volume unit, when this is a fuel purchase with volume.
    pub fn price_per_unit(&self) -> Option<Decimal> {
        let fuel = self.fuel.as_ref()?;
        if fuel.fuel_volume.is_zero() {
            return None;
        }
        Some(self.amount / fuel.fuel_volume)
    }
}
