//! Boolean condition trees evaluated against a single transaction.

use fleetsight_core::PropertyName;
use serde::{Deserialize, Serialize};

use super::Threshold;

/// A predicate tree node.
///
/// Trees are finite and acyclic by construction (built bottom-up from the
/// deserialized document; no back-references). Child order is fixed: the
/// evaluator walks `all`/`any` children left to right and short-circuits,
/// so authors can put the cheap checks first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Leaf: compare one transaction property against a threshold.
    Attribute(AttributeCheck),
    /// Conjunction: true when every child is true.
    All(Vec<Condition>),
    /// Disjunction: true when at least one child is true.
    Any(Vec<Condition>),
    /// Negation of exactly one child.
    Not(Box<Condition>),
}

impl Condition {
    /// Visit every attribute leaf in document order.
    pub fn for_each_check<'a>(&'a self, f: &mut impl FnMut(&'a AttributeCheck)) {
        match self {
            Condition::Attribute(check) => f(check),
            Condition::All(children) | Condition::Any(children) => {
                for child in children {
                    child.for_each_check(f);
                }
            }
            Condition::Not(child) => child.for_each_check(f),
        }
    }
}

/// A single attribute comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AttributeCheck {
    /// Which transaction property to read. Unknown names fail
    /// deserialization, so rule files cannot reference properties the
    /// engine does not recognize.
    pub property: PropertyName,
    pub op: ComparisonOp,
    pub threshold: Threshold,
    /// When true, an absent property makes this check false instead of
    /// failing the whole rule with an unresolved-property error.
    #[serde(default)]
    pub optional: bool,
}

/// Comparison operators for attribute checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Case-insensitive substring match on text properties.
    Contains,
    /// Point-in-region test delegated to the geometry collaborator.
    WithinRegion,
    /// True when the text value is not among the threshold's tokens.
    NotInSet,
}

impl ComparisonOp {
    /// Whether this operator orders two numbers (as opposed to testing
    /// text, membership, or geometry).
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            ComparisonOp::Gt | ComparisonOp::Ge | ComparisonOp::Lt | ComparisonOp::Le
        )
    }
}

impl std::fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComparisonOp::Eq => write!(f, "eq"),
            ComparisonOp::Ne => write!(f, "ne"),
            ComparisonOp::Gt => write!(f, "gt"),
            ComparisonOp::Ge => write!(f, "ge"),
            ComparisonOp::Lt => write!(f, "lt"),
            ComparisonOp::Le => write!(f, "le"),
            ComparisonOp::Contains => write!(f, "contains"),
            ComparisonOp::WithinRegion => write!(f, "within_region"),
            ComparisonOp::NotInSet => write!(f, "not_in_set"),
        }
    }
}
