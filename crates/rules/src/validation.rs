//! Policy validation with structured errors and advisory warnings.
//!
//! Runs at load time, before a policy can enter a snapshot. Anything that
//! would make a rule unevaluable (empty combinators, property/operator
//! mismatches, broken templates) is a blocking error here, so the evaluator
//! never sees a malformed rule mid-batch.

use fleetsight_core::ValueKind;
use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::schema::{
    Action, AttributeCheck, ComparisonOp, Condition, Policy, Rule, ThresholdShape, ThresholdValue,
    POLICY_API_VERSION, POLICY_KIND,
};

// ── Result types ────────────────────────────────────────────────────

/// Overall validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// A blocking validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// JSON-path-like location, e.g. `"rules[0].condition.all[1]"`.
    pub path: String,
    pub message: String,
}

/// A non-blocking advisory warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Join error messages into one line for logs and load failures.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Validate a parsed [`Policy`].
pub fn validate_policy(policy: &Policy) -> ValidationResult {
    let mut result = ValidationResult::new();

    if policy.kind != POLICY_KIND {
        result.error("kind", format!("expected '{}', got '{}'", POLICY_KIND, policy.kind));
    }
    if policy.api_version != POLICY_API_VERSION {
        result.warn(
            "apiVersion",
            format!("unrecognized version '{}'", policy.api_version),
        );
    }
    if policy.metadata.id.is_empty() {
        result.error("metadata.id", "policy id must not be empty");
    }
    if policy.rules.is_empty() {
        result.warn("rules", "policy defines no rules");
    }

    let mut seen_ids = std::collections::HashSet::new();
    for (i, rule) in policy.rules.iter().enumerate() {
        let path = format!("rules[{}]", i);
        if !seen_ids.insert(rule.id.as_str()) {
            result.error(&path, format!("duplicate rule id '{}'", rule.id));
        }
        validate_rule(rule, &path, &mut result);
    }

    result
}

fn validate_rule(rule: &Rule, path: &str, result: &mut ValidationResult) {
    if rule.id.is_empty() {
        result.error(format!("{}.id", path), "rule id must not be empty");
    }
    if rule.actions.is_empty() {
        result.error(format!("{}.actions", path), "rule must declare at least one action");
    }

    validate_condition(&rule.condition, rule, &format!("{}.condition", path), result);

    for (i, action) in rule.actions.iter().enumerate() {
        validate_action(action, &format!("{}.actions[{}]", path, i), result);
    }
}

fn validate_condition(
    condition: &Condition,
    rule: &Rule,
    path: &str,
    result: &mut ValidationResult,
) {
    match condition {
        Condition::All(children) | Condition::Any(children) => {
            if children.is_empty() {
                result.error(path, "combinator must have at least one child");
            }
            let tag = if matches!(condition, Condition::All(_)) {
                "all"
            } else {
                "any"
            };
            for (i, child) in children.iter().enumerate() {
                validate_condition(child, rule, &format!("{}.{}[{}]", path, tag, i), result);
            }
        }
        Condition::Not(child) => {
            validate_condition(child, rule, &format!("{}.not", path), result);
        }
        Condition::Attribute(check) => validate_check(check, rule, path, result),
    }
}

fn validate_check(check: &AttributeCheck, rule: &Rule, path: &str, result: &mut ValidationResult) {
    if !check.property.applies_to(rule.applies_to) {
        result.error(
            path,
            format!(
                "property '{}' is not available on '{}' transactions",
                check.property, rule.applies_to
            ),
        );
        return;
    }

    let value_kind = check.property.value_kind();
    let shape = check.threshold.value.shape();

    // A duration threshold that does not parse is useless regardless of
    // which operator it is attached to.
    if let ThresholdValue::Duration { duration } = &check.threshold.value {
        if parse_duration(duration).is_none() {
            result.error(path, format!("unparseable duration '{}'", duration));
            return;
        }
    }

    let compatible = match check.op {
        op if op.is_ordering() => {
            value_kind == ValueKind::Number
                && matches!(shape, ThresholdShape::Number | ThresholdShape::Duration)
        }
        ComparisonOp::Eq | ComparisonOp::Ne => match value_kind {
            ValueKind::Number => matches!(shape, ThresholdShape::Number | ThresholdShape::Duration),
            ValueKind::Text => shape == ThresholdShape::Text,
            ValueKind::Flag => shape == ThresholdShape::Flag,
            ValueKind::Point => false,
        },
        ComparisonOp::Contains => value_kind == ValueKind::Text && shape == ThresholdShape::Text,
        ComparisonOp::WithinRegion => {
            value_kind == ValueKind::Point && shape == ThresholdShape::Region
        }
        ComparisonOp::NotInSet => value_kind == ValueKind::Text && shape == ThresholdShape::Tokens,
        _ => unreachable!("ordering ops handled above"),
    };

    if !compatible {
        result.error(
            path,
            format!(
                "operator '{}' cannot compare {} property '{}' against a {} threshold",
                check.op, value_kind, check.property, shape
            ),
        );
    }

    if check.op == ComparisonOp::NotInSet {
        if let Some(tokens) = check.threshold.value.as_tokens() {
            if tokens.is_empty() {
                result.error(path, "not_in_set requires a non-empty allowed set");
            }
        }
    }

    if check.optional && !check.property.inherently_optional() {
        result.warn(
            path,
            format!(
                "property '{}' is always present; the optional flag has no effect",
                check.property
            ),
        );
    }
}

fn validate_action(action: &Action, path: &str, result: &mut ValidationResult) {
    if let Some(template) = action.template() {
        let env = minijinja::Environment::new();
        if let Err(e) = env.template_from_str(template) {
            result.error(path, format!("invalid template: {}", e));
        }
    }
    if let Action::UpdateStatus {
        target_property,
        new_value,
    } = action
    {
        if target_property.is_empty() {
            result.error(path, "update_status requires a target property");
        }
        if new_value.is_empty() {
            result.error(path, "update_status requires a new value");
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
