//! Action dispatch: matched rules to effect request values.
//!
//! The dispatcher is side-effect-free. Each action becomes a request value
//! for an external collaborator; nothing here touches network or storage,
//! which is what makes rule-to-effect mapping unit-testable.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! [`minijinja::Environment`] is created per render call. Undefined
//! behavior is strict: a template referencing a field the transaction does
//! not carry fails with a render error instead of silently emitting
//! nothing.

use chrono::{DateTime, Utc};
use fleetsight_core::AnomalyDraft;
use fleetsight_rules::schema::{Action, NotifyChannel, Rule};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::context::EvaluationContext;
use crate::error::DispatchError;

/// A discrete, externally deliverable effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectRequest {
    /// Consumed by the detector's caller and upserted by the persistence
    /// sink; the other variants go to the effect gateway.
    CreateAnomaly(AnomalyDraft),
    UpdateStatus(StatusUpdateRequest),
    Notify(NotificationRequest),
    InvokeService(ServiceInvocationRequest),
}

/// Ask the mutation collaborator to set a property on the target entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdateRequest {
    /// Transaction the update targets.
    pub target: String,
    pub property: String,
    pub value: String,
}

/// A rendered message for the notification gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRequest {
    pub channel: NotifyChannel,
    pub role: String,
    pub rendered_message: String,
}

/// A rendered payload for an external service call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceInvocationRequest {
    pub service_ref: String,
    pub rendered_payload: String,
}

/// Template scope: transaction fields at the root, rule metadata under
/// `rule`. Absent optionals are omitted entirely so referencing them in a
/// template is a render error, not an empty substitution.
#[derive(Serialize)]
struct TemplateScope<'a> {
    transaction_id: &'a str,
    kind: String,
    timestamp: String,
    amount: &'a Decimal,
    currency: &'a str,
    merchant_name: &'a str,
    merchant_category: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    vehicle_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    driver_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    odometer_reading: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fuel_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fuel_volume: Option<&'a Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    price_per_unit: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    maintenance_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ml_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ml_label: Option<&'a str>,
    rule: RuleScope<'a>,
}

#[derive(Serialize)]
struct RuleScope<'a> {
    id: &'a str,
    priority: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

/// Maps triggered actions to effect requests.
#[derive(Debug, Default)]
pub struct ActionDispatcher {
    _private: (),
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Resolve one action of a matched rule into an effect request.
    pub fn dispatch(
        &self,
        action: &Action,
        rule: &Rule,
        ctx: &EvaluationContext<'_>,
        detected_at: DateTime<Utc>,
    ) -> Result<EffectRequest, DispatchError> {
        let txn = ctx.transaction();
        match action {
            Action::CreateAnomaly {
                anomaly_type,
                reason_template,
            } => {
                let reason = self.render(reason_template, rule, ctx, action.label())?;
                Ok(EffectRequest::CreateAnomaly(AnomalyDraft::new(
                    txn.transaction_id.clone(),
                    rule.id.clone(),
                    *anomaly_type,
                    reason,
                    txn.ml.as_ref().map(|ml| ml.score),
                    detected_at,
                )))
            }
            Action::UpdateStatus {
                target_property,
                new_value,
            } => Ok(EffectRequest::UpdateStatus(StatusUpdateRequest {
                target: txn.transaction_id.clone(),
                property: target_property.clone(),
                value: new_value.clone(),
            })),
            Action::Notify {
                channel,
                template,
                role,
            } => {
                let rendered_message = self.render(template, rule, ctx, action.label())?;
                Ok(EffectRequest::Notify(NotificationRequest {
                    channel: *channel,
                    role: role.clone(),
                    rendered_message,
                }))
            }
            Action::InvokeService {
                service_ref,
                payload_template,
            } => {
                let rendered_payload = self.render(payload_template, rule, ctx, action.label())?;
                Ok(EffectRequest::InvokeService(ServiceInvocationRequest {
                    service_ref: service_ref.clone(),
                    rendered_payload,
                }))
            }
        }
    }

    fn render(
        &self,
        template: &str,
        rule: &Rule,
        ctx: &EvaluationContext<'_>,
        action: &'static str,
    ) -> Result<String, DispatchError> {
        let txn = ctx.transaction();
        let scope = TemplateScope {
            transaction_id: &txn.transaction_id,
            kind: txn.kind.to_string(),
            timestamp: txn.timestamp.to_rfc3339(),
            amount: &txn.amount,
            currency: &txn.currency,
            merchant_name: &txn.merchant_name,
            merchant_category: &txn.merchant_category,
            vehicle_id: txn.vehicle_id.as_deref(),
            driver_id: txn.driver_id.as_deref(),
            odometer_reading: txn.odometer_reading,
            fuel_type: txn.fuel.as_ref().map(|f| f.fuel_type.as_str()),
            fuel_volume: txn.fuel.as_ref().map(|f| &f.fuel_volume),
            price_per_unit: txn.price_per_unit(),
            maintenance_type: txn.maintenance.as_ref().map(|m| m.maintenance_type.as_str()),
            ml_score: txn.ml.as_ref().map(|ml| ml.score),
            ml_label: txn.ml.as_ref().map(|ml| ml.label.as_str()),
            rule: RuleScope {
                id: &rule.id,
                priority: rule.priority,
                description: rule.description.as_deref(),
            },
        };

        let env = build_env();
        env.render_str(template, &scope)
            .map_err(|e| DispatchError::TemplateRender {
                action,
                message: e.to_string(),
            })
    }
}

/// Build a configured minijinja environment.
fn build_env() -> minijinja::Environment<'static> {
    let mut env = minijinja::Environment::new();
    env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
    env.add_filter("round", round_filter);
    env
}

/// Custom filter: round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}
