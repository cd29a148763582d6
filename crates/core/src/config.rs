//! Engine configuration from environment variables.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Engine config ─────────────────────────────────────────────

/// Runtime knobs for the detection engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory scanned for policy YAML files.
    pub rules_dir: PathBuf,
    /// Per-rule cap on in-memory audit log entries.
    pub audit_max_entries: usize,
    /// Run batch detection on the rayon pool instead of sequentially.
    pub parallel_detection: bool,
    /// Length in hours of the frequency window used by
    /// `transactions_in_window`.
    pub frequency_window_hours: i64,
}

impl EngineConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            rules_dir: PathBuf::from(env_or("FLEETSIGHT_RULES_DIR", "policies")),
            audit_max_entries: env_usize("FLEETSIGHT_AUDIT_CAP", 500),
            parallel_detection: env_bool("FLEETSIGHT_PARALLEL", true),
            frequency_window_hours: env_i64("FLEETSIGHT_FREQUENCY_WINDOW_HOURS", 24),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!(
            rules_dir = %self.rules_dir.display(),
            audit_max_entries = self.audit_max_entries,
            parallel_detection = self.parallel_detection,
            frequency_window_hours = self.frequency_window_hours,
            "engine config loaded"
        );
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules_dir: PathBuf::from("policies"),
            audit_max_entries: 500,
            parallel_detection: true,
            frequency_window_hours: 24,
        }
    }
}
