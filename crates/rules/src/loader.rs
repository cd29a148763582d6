//! Filesystem-backed policy loading.
//!
//! Scans a directory (recursively) for `*.yml` / `*.yaml` policy documents,
//! validates each one, and assembles a [`RuleSnapshot`]. There is no
//! watcher: a snapshot is captured at batch start and discarded after the
//! batch, so reload is an explicit re-scan, never a background mutation.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::schema::Policy;
use crate::snapshot::{RuleSnapshot, SnapshotError};
use crate::validation::validate_policy;

/// Errors that can occur during policy loading.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Policy failed load-time validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Snapshot assembly failed (invalid policy, duplicate rule ids).
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Result alias for loader operations.
pub type Result<T> = std::result::Result<T, RuleError>;

/// Outcome of loading a single policy file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    Loaded { policy_id: String, rule_count: usize },
    Skipped { reason: String },
    Failed { error: String },
}

/// A freshly assembled snapshot plus per-file load outcomes.
#[derive(Debug)]
pub struct SnapshotLoad {
    pub snapshot: RuleSnapshot,
    pub results: Vec<LoadResult>,
}

/// Filesystem policy loader.
pub struct PolicyLoader {
    policies_dir: PathBuf,
}

impl PolicyLoader {
    /// Create a loader for the given directory.
    pub fn new(policies_dir: PathBuf) -> Self {
        Self { policies_dir }
    }

    /// Scan the directory and build a snapshot from every valid policy.
    ///
    /// Files that fail to parse or validate are reported in the results and
    /// excluded; they never poison the snapshot. An unreadable directory is
    /// fatal: no partial snapshot is ever served.
    pub fn load_snapshot(&self) -> Result<SnapshotLoad> {
        let (policies, results) = self.scan()?;
        let snapshot = RuleSnapshot::from_policies(&policies)?;
        info!(
            policies = policies.len(),
            rules = snapshot.len(),
            dir = %self.policies_dir.display(),
            "policy snapshot loaded"
        );
        Ok(SnapshotLoad { snapshot, results })
    }

    /// Recursively scan for policy files, collecting parsed policies and
    /// per-file outcomes.
    pub fn scan(&self) -> Result<(Vec<Policy>, Vec<LoadResult>)> {
        let mut policies = Vec::new();
        let mut results = Vec::new();
        self.scan_dir_recursive(&self.policies_dir, &mut policies, &mut results)?;
        Ok((policies, results))
    }

    fn scan_dir_recursive(
        &self,
        dir: &Path,
        policies: &mut Vec<Policy>,
        results: &mut Vec<LoadResult>,
    ) -> Result<()> {
        let entries = fs::read_dir(dir)?;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();

            // Skip dotfiles/dotdirs
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    if path.is_file() {
                        results.push(LoadResult {
                            path,
                            status: LoadStatus::Skipped {
                                reason: "dotfile".to_string(),
                            },
                        });
                    }
                    continue;
                }
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, policies, results)?;
                continue;
            }

            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "yml" || e == "yaml")
                .unwrap_or(false);

            if !is_yaml {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            match self.load_file(&path) {
                Ok(policy) => {
                    info!(
                        policy_id = %policy.metadata.id,
                        rules = policy.rules.len(),
                        path = %path.display(),
                        "loaded policy"
                    );
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded {
                            policy_id: policy.metadata.id.clone(),
                            rule_count: policy.rules.len(),
                        },
                    });
                    policies.push(policy);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load policy file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }

    /// Parse and validate a single policy file.
    pub fn load_file(&self, path: &Path) -> Result<Policy> {
        let contents = fs::read_to_string(path)?;
        let policy: Policy = serde_yaml::from_str(&contents)?;

        let result = validate_policy(&policy);
        for warning in &result.warnings {
            warn!(
                policy_id = %policy.metadata.id,
                path = %warning.path,
                message = %warning.message,
                "policy validation warning"
            );
        }
        if !result.valid {
            return Err(RuleError::Validation(format!(
                "policy '{}': {}",
                policy.metadata.id,
                result.summary()
            )));
        }
        Ok(policy)
    }

    pub fn policies_dir(&self) -> &Path {
        &self.policies_dir
    }
}
