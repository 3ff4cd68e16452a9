//! Validated rules, as handed from the linter to the evaluator.

use flightdeck_core::{Category, Row};
use serde::Serialize;

use super::{RuleRecord, Scope, Severity};
use crate::dsl::Expr;

/// A rule that passed every lint check. Immutable for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub id: String,
    /// Index of the rule in its authoring source; the ranking tie-break.
    pub position: usize,
    pub enabled: bool,
    pub severity: Severity,
    pub scope: Scope,
    pub condition: String,
    /// Message template with `{Field}` placeholders.
    pub message: String,
    pub description: String,
    pub escalation: String,
    pub required_fields: Vec<String>,
    pub applies_to: AppliesTo,
}

impl Rule {
    /// Canonical record for snapshot export.
    pub fn to_record(&self) -> RuleRecord {
        RuleRecord {
            rule_id: self.id.clone(),
            enabled: if self.enabled { "TRUE" } else { "FALSE" }.to_string(),
            severity: self.severity.to_string(),
            scope: self.scope.to_string(),
            description: self.description.clone(),
            condition: self.condition.clone(),
            message: self.message.clone(),
            escalation: self.escalation.clone(),
            required_fields: self.required_fields.clone(),
            applies_to_line: self.applies_to.lines.join(","),
            applies_to_machine: self.applies_to.machines.join(","),
            applies_to_sku: self.applies_to.skus.join(","),
            position: Some(self.position),
        }
    }
}

// ── Row filters ─────────────────────────────────────────────────────

/// Row filters from the `AppliesToLine`, `AppliesToMachine` and
/// `AppliesToSKU` columns. An empty list matches every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppliesTo {
    pub lines: Vec<String>,
    pub machines: Vec<String>,
    pub skus: Vec<String>,
}

impl AppliesTo {
    /// Parse the three filter cells. Each is a comma-separated list of
    /// exact values; blank or `*` means "all".
    pub fn from_record(record: &RuleRecord) -> Self {
        Self {
            lines: filter_values(&record.applies_to_line),
            machines: filter_values(&record.applies_to_machine),
            skus: filter_values(&record.applies_to_sku),
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.lines.is_empty() && self.machines.is_empty() && self.skus.is_empty()
    }

    /// Active filters as (authoring column, row field, values) for a category.
    pub fn active(&self, category: Category) -> Vec<(&'static str, &'static str, &[String])> {
        [
            ("AppliesToLine", "Line", &self.lines),
            ("AppliesToMachine", "Machine", &self.machines),
            ("AppliesToSKU", category.sku_field(), &self.skus),
        ]
        .into_iter()
        .filter(|(_, _, values)| !values.is_empty())
        .map(|(column, field, values)| (column, field, values.as_slice()))
        .collect()
    }

    /// Whether a row of `category` passes every active filter. A row with
    /// the filtered field blank never passes.
    pub fn matches(&self, category: Category, row: &Row) -> bool {
        self.active(category).into_iter().all(|(_, field, values)| {
            let value = row.value(field);
            if value.is_missing() {
                return false;
            }
            let text = value.to_string();
            values.iter().any(|v| v == text.trim())
        })
    }
}

fn filter_values(raw: &str) -> Vec<String> {
    let values: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if values.iter().any(|v| v == "*") {
        Vec::new()
    } else {
        values
    }
}

/// A rule together with its condition compiled once for the run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub rule: Rule,
    pub expr: Expr,
}

impl CompiledRule {
    pub fn id(&self) -> &str {
        &self.rule.id
    }

    /// Fields reported as evidence when the rule matches: the declared
    /// required fields, or every field the condition reads.
    pub fn evidence_fields(&self) -> Vec<String> {
        if self.rule.required_fields.is_empty() {
            self.expr.fields().into_iter().collect()
        } else {
            self.rule.required_fields.clone()
        }
    }
}
