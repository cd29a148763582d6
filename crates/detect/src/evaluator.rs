//! Condition tree evaluation.
//!
//! `evaluate` is a pure function of (condition, context): no hidden state,
//! identical inputs always produce identical results. `all`/`any` walk
//! children left to right and short-circuit, but an error hit before the
//! short-circuit point still propagates as a rule-level error.

use fleetsight_core::PropertyValue;
use fleetsight_rules::schema::{AttributeCheck, ComparisonOp, Condition};

use crate::context::EvaluationContext;
use crate::error::EvalError;

/// Evaluate a condition tree against one transaction's context.
pub fn evaluate(condition: &Condition, ctx: &EvaluationContext<'_>) -> Result<bool, EvalError> {
    match condition {
        Condition::All(children) => {
            for child in children {
                if !evaluate(child, ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Any(children) => {
            for child in children {
                if evaluate(child, ctx)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::Not(child) => Ok(!evaluate(child, ctx)?),
        Condition::Attribute(check) => evaluate_check(check, ctx),
    }
}

fn evaluate_check(check: &AttributeCheck, ctx: &EvaluationContext<'_>) -> Result<bool, EvalError> {
    let value = match ctx.property(check.property) {
        Some(value) => value,
        // An absent optional property is a non-match, not an error.
        None if check.optional => return Ok(false),
        None => {
            return Err(EvalError::UnresolvedProperty {
                property: check.property,
            })
        }
    };

    let mismatch = || EvalError::TypeMismatch {
        property: check.property,
        op: check.op,
    };

    match check.op {
        ComparisonOp::Gt | ComparisonOp::Ge | ComparisonOp::Lt | ComparisonOp::Le => {
            let left = value.as_number().ok_or_else(mismatch)?;
            let right = check.threshold.value.as_number().ok_or_else(mismatch)?;
            Ok(match check.op {
                ComparisonOp::Gt => left > right,
                ComparisonOp::Ge => left >= right,
                ComparisonOp::Lt => left < right,
                ComparisonOp::Le => left <= right,
                _ => unreachable!(),
            })
        }
        ComparisonOp::Eq | ComparisonOp::Ne => {
            let equal = match &value {
                PropertyValue::Number(n) => {
                    *n == check.threshold.value.as_number().ok_or_else(mismatch)?
                }
                PropertyValue::Text(t) => {
                    t.as_str() == check.threshold.value.as_text().ok_or_else(mismatch)?
                }
                PropertyValue::Flag(b) => {
                    *b == check.threshold.value.as_flag().ok_or_else(mismatch)?
                }
                PropertyValue::Point(_) => return Err(mismatch()),
            };
            Ok(if check.op == ComparisonOp::Eq {
                equal
            } else {
                !equal
            })
        }
        ComparisonOp::Contains => {
            let haystack = value.as_text().ok_or_else(mismatch)?;
            let needle = check.threshold.value.as_text().ok_or_else(mismatch)?;
            Ok(haystack.to_lowercase().contains(&needle.to_lowercase()))
        }
        ComparisonOp::WithinRegion => {
            let point = value.as_point().ok_or_else(mismatch)?;
            let region = check.threshold.value.as_region().ok_or_else(mismatch)?;
            ctx.regions()
                .contains(region, point)
                .map_err(|e| EvalError::GeometryLookup {
                    region: e.region,
                    message: e.message,
                })
        }
        ComparisonOp::NotInSet => {
            let text = value.as_text().ok_or_else(mismatch)?;
            let tokens = check.threshold.value.as_tokens().ok_or_else(mismatch)?;
            Ok(!tokens.iter().any(|t| t.as_str() == text))
        }
    }
}
