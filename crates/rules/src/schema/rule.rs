//! Rule definition: a prioritized pairing of one condition and its actions.

use fleetsight_core::TransactionKind;
use serde::{Deserialize, Serialize};

use super::{Action, Condition};

/// A single detection rule.
///
/// Rules are owned by a policy and loaded read-only for the duration of a
/// detection pass. Lower `priority` evaluates first; ties break on rule id
/// ascending, which keeps action-dispatch ordering deterministic. All
/// matching rules fire; priority never suppresses a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Transaction kind this rule applies to.
    pub applies_to: TransactionKind,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub condition: Condition,
    /// Ordered effect descriptions resolved when the condition matches.
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub actions: Vec<Action>,
}

pub(crate) fn default_true() -> bool {
    true
}
