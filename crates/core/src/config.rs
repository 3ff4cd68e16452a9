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

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    profiled_env_opt(profile, key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub rules: RulesConfig,
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FLIGHTDECK_PROFILE`. When set (e.g. `PLANT2`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("FLIGHTDECK_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            rules: RulesConfig::from_env_profiled(p),
            analysis: AnalysisConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Log the effective settings at startup.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  rules:       path={}", self.rules.rules_path.display());
        tracing::info!("  dataset:     path={}", self.analysis.dataset_path.display());
        tracing::info!(
            "  analysis:    top_actions={}, parallel={}, threads={}",
            self.analysis.top_actions,
            self.analysis.parallel,
            self.analysis.threads
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            rules: RulesConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

// ── Rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Rule snapshot (JSON or YAML) or exported authoring table.
    pub rules_path: PathBuf,
}

impl RulesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            rules_path: PathBuf::from(profiled_env_or(p, "RULES_PATH", "data/rules.json")),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from("data/rules.json"),
        }
    }
}

// ── Analysis ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub dataset_path: PathBuf,
    /// Number of ranked actions listed in the Recommended Actions section.
    pub top_actions: usize,
    /// Evaluate rules on a rayon pool instead of sequentially.
    pub parallel: bool,
    /// Pool size when `parallel` is set (0 = rayon default).
    pub threads: usize,
}

impl AnalysisConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            dataset_path: PathBuf::from(profiled_env_or(p, "DATASET_PATH", "data/dataset.json")),
            top_actions: profiled_env_usize(p, "REPORT_TOP_ACTIONS", 10),
            parallel: profiled_env_bool(p, "ANALYSIS_PARALLEL", false),
            threads: profiled_env_usize(p, "ANALYSIS_THREADS", 0),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/dataset.json"),
            top_actions: 10,
            parallel: false,
            threads: 0,
        }
    }
}
