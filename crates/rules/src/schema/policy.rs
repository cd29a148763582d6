//! Top-level policy document parsed from YAML.

use serde::{Deserialize, Serialize};

use super::{PolicyMetadata, Rule};

/// Expected `kind` header value for policy documents.
pub const POLICY_KIND: &str = "Policy";

/// Supported `apiVersion` header value.
pub const POLICY_API_VERSION: &str = "v1";

/// A group of rules under shared metadata.
///
/// Grouping and metadata only; a policy has no behavior of its own beyond
/// owning its rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: PolicyMetadata,
    pub rules: Vec<Rule>,
}

impl Policy {
    /// Parse a policy document from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize back to YAML (used when persisting edited policies).
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
