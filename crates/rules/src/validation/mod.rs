//! Rule linter.
//!
//! Every authored record is checked before evaluation. A record that fails a
//! check becomes a [`LintIssue`] and is left out of the compiled rule set; it
//! is still listed in the report's Rule Lint section.
//!
//! Checks, in order (the first failure is reported):
//! 1. id, severity, scope and condition present; id not already used
//! 2. severity, scope and the enabled flag are legal values
//! 3. condition parses
//! 4. fields and functions are legal for the scope, and declared required
//!    fields are legal and cover the condition
//! 5. `AppliesTo*` row filters name fields the scope defines

mod rule_checks;

pub mod fuzzy;

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use flightdeck_core::Category;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::schema::{CompiledRule, RuleRecord};

// ── Result types ────────────────────────────────────────────────────

/// Why a rule was excluded from evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintIssue {
    pub rule_id: String,
    /// Index of the rule in its authoring source.
    pub position: usize,
    pub reason: String,
    /// Optional "did you mean" suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl LintIssue {
    pub(crate) fn new(record: &RuleRecord, position: usize, reason: impl Into<String>) -> Self {
        let id = record.rule_id.trim();
        Self {
            rule_id: if id.is_empty() {
                format!("#{}", position + 1)
            } else {
                id.to_string()
            },
            position,
            reason: reason.into(),
            suggestion: None,
        }
    }

    pub(crate) fn with_suggestion(mut self, suggestion: Option<&str>) -> Self {
        self.suggestion = suggestion.map(String::from);
        self
    }
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule_id, self.reason)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean '{}'?)", suggestion)?;
        }
        Ok(())
    }
}

/// Lint outcome for a whole rule source.
#[derive(Debug, Clone, Default)]
pub struct LintReport {
    /// Rules that passed every check, enabled or not, in authoring order.
    pub rules: Vec<CompiledRule>,
    pub issues: Vec<LintIssue>,
}

// ── Public API ──────────────────────────────────────────────────────

/// Lint records in authoring order.
pub fn lint_rules(records: &[RuleRecord]) -> LintReport {
    let mut report = LintReport::default();
    let mut first_seen = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        // Snapshots carry the authoring position; tables use row order.
        let position = record.position.unwrap_or(index);
        match rule_checks::check_record(record, position, &mut first_seen) {
            Ok(rule) => {
                debug!(rule_id = %rule.id(), scope = %rule.rule.scope, "rule passed lint");
                report.rules.push(rule);
            }
            Err(issue) => {
                warn!(rule_id = %issue.rule_id, reason = %issue.reason, "rule failed lint");
                report.issues.push(issue);
            }
        }
    }

    report
}

/// Issues for enabled row-scoped rules whose category the dataset does not contain.
pub fn absent_scope_issues(rules: &[&CompiledRule], present: &BTreeSet<Category>) -> Vec<LintIssue> {
    rules
        .iter()
        .filter_map(|compiled| {
            let category = compiled.rule.scope.category()?;
            if present.contains(&category) {
                return None;
            }
            Some(LintIssue {
                rule_id: compiled.rule.id.clone(),
                position: compiled.rule.position,
                reason: format!("scope {} is absent from the dataset", compiled.rule.scope),
                suggestion: None,
            })
        })
        .collect()
}
