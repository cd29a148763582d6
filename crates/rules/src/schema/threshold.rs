//! Threshold scalars referenced by attribute checks.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;

/// A named scalar owned by the rule that references it.
///
/// Immutable once the owning rule version is published; the engine only
/// ever reads thresholds out of a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Threshold {
    #[serde(default)]
    pub name: Option<String>,
    pub value: ThresholdValue,
    #[serde(default)]
    pub unit: Option<String>,
}

impl Threshold {
    /// Bare numeric threshold, the common case.
    pub fn number(value: Decimal) -> Self {
        Self {
            name: None,
            value: ThresholdValue::Number(value),
            unit: None,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            name: None,
            value: ThresholdValue::Text(value.into()),
            unit: None,
        }
    }

    pub fn region(region: impl Into<String>) -> Self {
        Self {
            name: None,
            value: ThresholdValue::Region {
                region: region.into(),
            },
            unit: None,
        }
    }

    pub fn tokens(tokens: Vec<String>) -> Self {
        Self {
            name: None,
            value: ThresholdValue::Tokens(tokens),
            unit: None,
        }
    }
}

/// The threshold's scalar payload.
///
/// Untagged: YAML numbers become `Number`, booleans `Flag`,
/// `{duration: "2h30m"}` maps become `Duration`, `{region: "..."}` maps
/// `Region`, sequences `Tokens`, and anything else a plain `Text`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ThresholdValue {
    Number(Decimal),
    Flag(bool),
    Duration { duration: String },
    Region { region: String },
    Tokens(Vec<String>),
    Text(String),
}

/// Shape tag used in validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdShape {
    Number,
    Flag,
    Duration,
    Region,
    Tokens,
    Text,
}

impl std::fmt::Display for ThresholdShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdShape::Number => write!(f, "number"),
            ThresholdShape::Flag => write!(f, "flag"),
            ThresholdShape::Duration => write!(f, "duration"),
            ThresholdShape::Region => write!(f, "region"),
            ThresholdShape::Tokens => write!(f, "tokens"),
            ThresholdShape::Text => write!(f, "text"),
        }
    }
}

impl ThresholdValue {
    pub fn shape(&self) -> ThresholdShape {
        match self {
            ThresholdValue::Number(_) => ThresholdShape::Number,
            ThresholdValue::Flag(_) => ThresholdShape::Flag,
            ThresholdValue::Duration { .. } => ThresholdShape::Duration,
            ThresholdValue::Region { .. } => ThresholdShape::Region,
            ThresholdValue::Tokens(_) => ThresholdShape::Tokens,
            ThresholdValue::Text(_) => ThresholdShape::Text,
        }
    }

    /// Numeric value for comparison. Durations compare as whole seconds.
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            ThresholdValue::Number(n) => Some(*n),
            ThresholdValue::Duration { duration } => {
                parse_duration(duration).map(|d| Decimal::from(d.as_secs()))
            }
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ThresholdValue::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ThresholdValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_region(&self) -> Option<&str> {
        match self {
            ThresholdValue::Region { region } => Some(region),
            _ => None,
        }
    }

    pub fn as_tokens(&self) -> Option<&[String]> {
        match self {
            ThresholdValue::Tokens(tokens) => Some(tokens),
            _ => None,
        }
    }
}
