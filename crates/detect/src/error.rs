//! Error types scoped to single-rule evaluation and single-action dispatch.
//!
//! None of these abort a batch: an evaluation error skips the one rule for
//! the one transaction, a dispatch error drops the one action. Both are
//! configuration problems surfaced through logs and the audit trail.

use fleetsight_core::PropertyName;
use fleetsight_rules::schema::ComparisonOp;

/// A rule-level evaluation failure.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum EvalError {
    /// A required property had no value on this transaction. The rule is
    /// skipped for the transaction and reported as a configuration problem.
    #[error("required property '{property}' is unresolved on this transaction")]
    UnresolvedProperty { property: PropertyName },

    /// The property value and threshold cannot be compared by the operator.
    /// Load-time validation prevents this for file-sourced rules; it guards
    /// rules assembled programmatically.
    #[error("operator '{op}' cannot be applied to property '{property}' with this threshold")]
    TypeMismatch {
        property: PropertyName,
        op: ComparisonOp,
    },

    /// The geometry collaborator failed a region lookup.
    #[error("region lookup for '{region}' failed: {message}")]
    GeometryLookup { region: String, message: String },
}

/// A single-action dispatch failure.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum DispatchError {
    /// Template rendering referenced a missing field or failed to evaluate.
    /// The action is dropped; the rest of the rule's actions still resolve.
    #[error("template for action '{action}' failed to render: {message}")]
    TemplateRender { action: &'static str, message: String },
}
