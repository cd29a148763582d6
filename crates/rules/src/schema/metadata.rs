//! Policy metadata shared by every policy document.

use serde::{Deserialize, Serialize};

use super::rule::default_true;

/// Header metadata for a policy document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PolicyMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// A disabled policy keeps its rules out of every snapshot.
    #[serde(default = "default_true")]
    pub enabled: bool,
}
