//! [`RuleRegistry`]: the linted rule set for one analysis run.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flightdeck_core::Row;
use serde::Serialize;
use tracing::{info, warn};

use crate::schema::{CompiledRule, RuleRecord, RuleSnapshot};
use crate::validation::{lint_rules, LintIssue, LintReport};

use super::error::{Result, RuleError};

/// Where the registry's rules came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RuleSource {
    /// The live authoring table.
    Table,
    Snapshot(PathBuf),
    /// No usable source; nothing is evaluated.
    None,
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::Table => write!(f, "table"),
            RuleSource::Snapshot(path) => write!(f, "snapshot ({})", path.display()),
            RuleSource::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

fn format_for(path: &Path) -> Result<Format> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => Ok(Format::Json),
        Some("yml") | Some("yaml") => Ok(Format::Yaml),
        _ => Err(RuleError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Linted rules in authoring order. Immutable once built.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    source: RuleSource,
    records: Vec<RuleRecord>,
    lint: LintReport,
}

impl RuleRegistry {
    /// Lint `records` and keep the ones that pass.
    pub fn from_records(records: Vec<RuleRecord>, source: RuleSource) -> Self {
        let lint = lint_rules(&records);
        info!(
            source = %source,
            records = records.len(),
            valid = lint.rules.len(),
            issues = lint.issues.len(),
            "rule registry built"
        );
        Self {
            source,
            records,
            lint,
        }
    }

    /// Build from authoring table rows (header to cell); blank rows are skipped.
    pub fn from_table(rows: &[Row]) -> Self {
        let records = rows.iter().filter_map(RuleRecord::from_table_row).collect();
        Self::from_records(records, RuleSource::Table)
    }

    pub fn empty() -> Self {
        Self::from_records(Vec::new(), RuleSource::None)
    }

    /// Read a JSON or YAML snapshot file, chosen by extension.
    pub fn read_snapshot(path: &Path) -> Result<RuleSnapshot> {
        let format = format_for(path)?;
        let contents = fs::read_to_string(path)?;
        let snapshot = match format {
            Format::Json => serde_json::from_str(&contents)?,
            Format::Yaml => serde_yaml::from_str(&contents)?,
        };
        Ok(snapshot)
    }

    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let snapshot = Self::read_snapshot(path)?;
        Ok(Self::from_records(
            snapshot.rules,
            RuleSource::Snapshot(path.to_path_buf()),
        ))
    }

    /// Load a snapshot, degrading to an empty registry when the file is
    /// missing or unreadable.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load_snapshot(path) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "rule snapshot unavailable, no rules will be evaluated");
                Self::empty()
            }
        }
    }

    /// Prefer a non-empty authoring table, then the snapshot at `snapshot_path`.
    pub fn select(table: Option<&[Row]>, snapshot_path: &Path) -> Self {
        if let Some(rows) = table {
            let registry = Self::from_table(rows);
            if !registry.records.is_empty() {
                return registry;
            }
        }
        Self::load_or_empty(snapshot_path)
    }

    pub fn source(&self) -> &RuleSource {
        &self.source
    }

    pub fn records(&self) -> &[RuleRecord] {
        &self.records
    }

    /// Every rule that passed lint, enabled or not.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.lint.rules
    }

    pub fn enabled_rules(&self) -> Vec<&CompiledRule> {
        self.lint.rules.iter().filter(|r| r.rule.enabled).collect()
    }

    pub fn lint_issues(&self) -> &[LintIssue] {
        &self.lint.issues
    }

    pub fn get(&self, id: &str) -> Option<&CompiledRule> {
        self.lint.rules.iter().find(|r| r.id() == id)
    }

    /// Snapshot of the valid rule set, disabled rules included.
    pub fn snapshot(&self, exported_at: DateTime<Utc>) -> RuleSnapshot {
        RuleSnapshot {
            exported_at: Some(exported_at),
            rules: self.lint.rules.iter().map(|r| r.rule.to_record()).collect(),
        }
    }

    /// Atomically write the valid-rule snapshot to `path`.
    ///
    /// Writes to a `.tmp` sibling first, then renames over the final path.
    pub fn write_snapshot(&self, path: &Path, exported_at: DateTime<Utc>) -> Result<usize> {
        let format = format_for(path)?;
        let snapshot = self.snapshot(exported_at);
        let body = match format {
            Format::Json => serde_json::to_string_pretty(&snapshot)?,
            Format::Yaml => serde_yaml::to_string(&snapshot)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rules".to_string());
        let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));
        fs::write(&tmp_path, body)?;
        fs::rename(&tmp_path, path)?;

        info!(path = %path.display(), rules = snapshot.rules.len(), "wrote rule snapshot");
        Ok(snapshot.rules.len())
    }
}
