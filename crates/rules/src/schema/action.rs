//! Declarative actions triggered when a rule matches.
//!
//! Actions describe effects; they never perform them. The dispatcher turns
//! each one into a request value for an external collaborator to deliver.

use fleetsight_core::AnomalyType;
use serde::{Deserialize, Serialize};

/// One effect description in a rule's ordered action list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Flag the transaction with an anomaly record in pending review.
    CreateAnomaly {
        anomaly_type: AnomalyType,
        /// Template for the human-readable reason; transaction fields are
        /// substituted at dispatch time.
        reason_template: String,
    },
    /// Ask the mutation collaborator to set a property on a target entity.
    UpdateStatus {
        target_property: String,
        new_value: String,
    },
    /// Send a rendered message to a role through a channel.
    Notify {
        channel: NotifyChannel,
        template: String,
        role: String,
    },
    /// Call an external service with a rendered payload.
    InvokeService {
        service_ref: String,
        payload_template: String,
    },
}

impl Action {
    /// Label used in logs and audit entries.
    pub fn label(&self) -> &'static str {
        match self {
            Action::CreateAnomaly { .. } => "create_anomaly",
            Action::UpdateStatus { .. } => "update_status",
            Action::Notify { .. } => "notify",
            Action::InvokeService { .. } => "invoke_service",
        }
    }

    /// The template string embedded in this action, if it has one.
    pub fn template(&self) -> Option<&str> {
        match self {
            Action::CreateAnomaly { reason_template, .. } => Some(reason_template),
            Action::Notify { template, .. } => Some(template),
            Action::InvokeService {
                payload_template, ..
            } => Some(payload_template),
            Action::UpdateStatus { .. } => None,
        }
    }
}

/// Notification channel types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyChannel {
    Email,
    Webhook,
    Sms,
}

impl std::fmt::Display for NotifyChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyChannel::Email => write!(f, "email"),
            NotifyChannel::Webhook => write!(f, "webhook"),
            NotifyChannel::Sms => write!(f, "sms"),
        }
    }
}
