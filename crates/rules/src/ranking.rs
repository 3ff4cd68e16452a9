//! Recommendation rendering and ranking.

use std::cmp::Reverse;

use flightdeck_core::{Category, Row};
use serde::Serialize;

use crate::analysis::{Finding, Location};
use crate::schema::{Scope, Severity};

/// Rendered in place of a placeholder the row cannot fill.
pub const UNKNOWN_PLACEHOLDER: &str = "<unknown>";

/// Replaces recommendations that use punitive wording.
pub const COACHING_SENTENCE: &str =
    "Provide coaching and process support to remove the operational barrier.";

const PUNITIVE_WORDS: &[&str] = &["disciplinary", "write-up", "punish", "terminate"];

/// Fill `{Field}` placeholders from the row.
pub fn render_template(template: &str, row: &Row) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if close > 0 && !after[..close].contains('{') => {
                let name = after[..close].trim();
                let value = row.value(name);
                if value.is_missing() {
                    out.push_str(UNKNOWN_PLACEHOLDER);
                } else {
                    out.push_str(&value.to_string());
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn sanitize_recommendation(text: &str) -> String {
    let lower = text.to_lowercase();
    if PUNITIVE_WORDS.iter().any(|w| lower.contains(w)) {
        COACHING_SENTENCE.to_string()
    } else {
        text.to_string()
    }
}

/// Render a rule's message for one row, replacing punitive wording.
pub fn render_recommendation(template: &str, row: &Row) -> String {
    sanitize_recommendation(&render_template(template, row))
}

/// One line of the Recommended Actions section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedAction {
    /// 1-based.
    pub rank: usize,
    pub rule_id: String,
    pub severity: Severity,
    pub scope: Scope,
    pub message: String,
    /// Row label, `Dataset` for dataset-wide findings.
    pub location: String,
}

impl RankedAction {
    pub fn line(&self) -> String {
        format!("{}: {} ({})", self.severity, self.message, self.location)
    }
}

/// Sort key: severity descending, rule position, then location with
/// dataset-wide findings first and rows in category then index order.
fn sort_key(finding: &Finding) -> (Reverse<Severity>, usize, Option<(Category, usize)>) {
    (
        Reverse(finding.severity),
        finding.position,
        finding.location.as_ref().map(|l| (l.category, l.index)),
    )
}

/// Order findings into ranked actions. Stable: equal keys keep input order.
pub fn rank(findings: &[Finding]) -> Vec<RankedAction> {
    let mut ordered: Vec<&Finding> = findings.iter().collect();
    ordered.sort_by_key(|f| sort_key(f));

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, f)| RankedAction {
            rank: i + 1,
            rule_id: f.rule_id.clone(),
            severity: f.severity,
            scope: f.scope,
            message: f.message.clone(),
            location: f
                .location
                .as_ref()
                .map(Location::display_label)
                .unwrap_or_else(|| "Dataset".to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(id: &str, severity: Severity, position: usize, location: Option<Location>) -> Finding {
        Finding {
            rule_id: id.to_string(),
            position,
            severity,
            scope: Scope::Hourly,
            message: format!("{id} message"),
            trigger: String::new(),
            evidence: Vec::new(),
            location,
        }
    }

    fn at(category: Category, index: usize, label: &str) -> Option<Location> {
        Some(Location {
            category,
            index,
            label: label.to_string(),
        })
    }

    #[test]
    fn renders_placeholders_and_unknowns() {
        let row = Row::new().with("Line", "Line 1").with("SKU", "").with("Std_CPH", 400.0);
        assert_eq!(
            render_template("Add standard for {SKU} on {Line} ({Std_CPH} cph) {Shift}", &row),
            "Add standard for <unknown> on Line 1 (400 cph) <unknown>"
        );
        assert_eq!(render_template("braces {} and {open", &row), "braces {} and {open");
    }

    #[test]
    fn punitive_wording_becomes_coaching() {
        assert_eq!(
            sanitize_recommendation("Issue a Write-Up to the operator"),
            COACHING_SENTENCE
        );
        assert_eq!(sanitize_recommendation("Check the filler"), "Check the filler");
        let row = Row::new().with("Machine", "Capper");
        assert_eq!(
            render_recommendation("Consider disciplinary action at {Machine}", &row),
            COACHING_SENTENCE
        );
    }

    #[test]
    fn ranks_by_severity_then_position_then_location() {
        let findings = vec![
            finding("W1", Severity::Warning, 0, at(Category::Hourly, 3, "Line 2")),
            finding("U2", Severity::Urgent, 5, at(Category::Hourly, 1, "Line 1")),
            finding("U1", Severity::Urgent, 2, at(Category::Hourly, 7, "Line 1")),
            finding("U1", Severity::Urgent, 2, at(Category::Hourly, 4, "Line 3")),
            finding("U1", Severity::Urgent, 2, None),
            finding("I1", Severity::Info, 1, None),
        ];
        let ranked = rank(&findings);
        let order: Vec<(&str, &str)> = ranked
            .iter()
            .map(|a| (a.rule_id.as_str(), a.location.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("U1", "Dataset"),
                ("U1", "Line 3"),
                ("U1", "Line 1"),
                ("U2", "Line 1"),
                ("W1", "Line 2"),
                ("I1", "Dataset"),
            ]
        );
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[5].rank, 6);
    }

    #[test]
    fn ranking_is_repeatable() {
        let findings = vec![
            finding("A", Severity::Info, 0, at(Category::Downtime, 0, "L1")),
            finding("B", Severity::Info, 0, at(Category::Downtime, 0, "L1")),
        ];
        assert_eq!(rank(&findings), rank(&findings));
        assert_eq!(rank(&findings)[0].rule_id, "A");
    }

    #[test]
    fn action_line_format() {
        let ranked = rank(&[finding("R2", Severity::Urgent, 0, at(Category::Standards, 1, "Line 1,SKU-001"))]);
        assert_eq!(ranked[0].line(), "Urgent: R2 message (Line 1,SKU-001)");
    }
}
