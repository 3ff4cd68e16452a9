//! Report assembly: fixed-order sections built from an analysis result.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::analysis::AnalysisResult;
use crate::loader::RuleRegistry;
use crate::ranking::{rank, RankedAction};
use crate::schema::Severity;
use crate::validation::LintIssue;

pub const DATA_QUALITY: &str = "Data Quality";
pub const SCHEDULE_INTEGRITY: &str = "Schedule Integrity";
pub const STANDARDS_COVERAGE: &str = "Standards Coverage";
pub const OPERATIONAL_RISKS: &str = "Operational Risks";
pub const RECOMMENDED_ACTIONS: &str = "Recommended Actions (ranked)";
pub const COACHING_PROMPTS: &str = "Rules Engine Coaching Prompts";
pub const RULE_LINT: &str = "Rule Lint";

/// Section titles in report order.
pub const SECTION_TITLES: [&str; 7] = [
    DATA_QUALITY,
    SCHEDULE_INTEGRITY,
    STANDARDS_COVERAGE,
    OPERATIONAL_RISKS,
    RECOMMENDED_ACTIONS,
    COACHING_PROMPTS,
    RULE_LINT,
];

pub const NO_LINT_ISSUES: &str = "No linter issues";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportLine {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ReportLine {
    fn text(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: None,
        }
    }

    fn value(label: impl Into<String>, value: impl ToString) -> Self {
        Self {
            label: label.into(),
            value: Some(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoachingPrompt {
    pub rule_id: String,
    pub severity: Severity,
    pub trigger: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionBody {
    Lines(Vec<ReportLine>),
    Prompts(Vec<CoachingPrompt>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    pub title: &'static str,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub partial: bool,
    pub sections: Vec<ReportSection>,
    /// Full ranked list; the Recommended Actions section holds the top entries.
    pub actions: Vec<RankedAction>,
    pub lint_issues: Vec<LintIssue>,
}

impl Report {
    /// Assemble the report. `top_actions` caps the Recommended Actions section.
    pub fn build(
        registry: &RuleRegistry,
        result: &AnalysisResult,
        generated_at: DateTime<Utc>,
        top_actions: usize,
    ) -> Self {
        let actions = rank(&result.findings);
        let lint_issues: Vec<LintIssue> = registry
            .lint_issues()
            .iter()
            .chain(&result.scope_issues)
            .cloned()
            .collect();

        let sections = vec![
            ReportSection {
                title: DATA_QUALITY,
                body: SectionBody::Lines(data_quality(registry, result)),
            },
            ReportSection {
                title: SCHEDULE_INTEGRITY,
                body: SectionBody::Lines(vec![
                    ReportLine::value(
                        "Hourly rows without schedule",
                        result.stats.hourly_without_schedule,
                    ),
                    ReportLine::value(
                        "Overlapping schedule lines",
                        result.stats.overlapping_schedule_lines,
                    ),
                ]),
            },
            ReportSection {
                title: STANDARDS_COVERAGE,
                body: SectionBody::Lines(vec![
                    ReportLine::value("Rows missing standards", result.stats.rows_missing_standards),
                    ReportLine::value(
                        "Standards missing rate",
                        format!("{:.1}%", result.stats.standards_missing_rate * 100.0),
                    ),
                ]),
            },
            ReportSection {
                title: OPERATIONAL_RISKS,
                body: SectionBody::Lines(operational_risks(result)),
            },
            ReportSection {
                title: RECOMMENDED_ACTIONS,
                body: SectionBody::Lines(
                    actions
                        .iter()
                        .take(top_actions)
                        .map(|a| ReportLine::text(a.line()))
                        .collect(),
                ),
            },
            ReportSection {
                title: COACHING_PROMPTS,
                body: SectionBody::Prompts(coaching_prompts(result, &actions)),
            },
            ReportSection {
                title: RULE_LINT,
                body: SectionBody::Lines(rule_lint(&lint_issues, result)),
            },
        ];

        Self {
            generated_at,
            partial: result.partial,
            sections,
            actions,
            lint_issues,
        }
    }

    pub fn section(&self, title: &str) -> Option<&ReportSection> {
        self.sections.iter().find(|s| s.title == title)
    }

    /// Plain-text rendering, one `- ` bullet per line.
    pub fn render_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analysis Report")?;
        writeln!(
            f,
            "Generated: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        if self.partial {
            writeln!(f, "Partial: analysis was interrupted")?;
        }

        for section in &self.sections {
            writeln!(f)?;
            writeln!(f, "{}", section.title)?;
            match &section.body {
                SectionBody::Lines(lines) => {
                    for line in lines {
                        match &line.value {
                            Some(value) => writeln!(f, "- {}: {}", line.label, value)?,
                            None => writeln!(f, "- {}", line.label)?,
                        }
                    }
                }
                SectionBody::Prompts(prompts) => {
                    writeln!(f, "RuleID | Severity | Trigger")?;
                    for p in prompts {
                        writeln!(f, "{} | {} | {}", p.rule_id, p.severity, p.trigger)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn data_quality(registry: &RuleRegistry, result: &AnalysisResult) -> Vec<ReportLine> {
    let stats = &result.stats;
    let mut lines = vec![
        ReportLine::value("Schedule rows", stats.schedule_rows),
        ReportLine::value("Hourly rows", stats.hourly_rows),
        ReportLine::value("Downtime rows", stats.downtime_rows),
        ReportLine::value("Standards rows", stats.standards_rows),
        ReportLine::value("Duplicate candidates", stats.duplicate_candidates),
        ReportLine::value("Rules source", registry.source()),
        ReportLine::value("Rules evaluated", result.rule_hits.len()),
    ];
    if result.partial {
        lines.push(ReportLine::value(
            "Rules skipped (interrupted)",
            result.skipped.join(", "),
        ));
    }
    lines
}

fn operational_risks(result: &AnalysisResult) -> Vec<ReportLine> {
    let mut lines = vec![ReportLine::value("Triggered prompts", result.findings.len())];
    for severity in Severity::ALL.iter().rev() {
        let count = result
            .findings
            .iter()
            .filter(|f| f.severity == *severity)
            .count();
        lines.push(ReportLine::value(format!("{} findings", severity), count));
    }
    for (rule_id, hits) in &result.rule_hits {
        lines.push(ReportLine::value(format!("{} hits", rule_id), hits));
    }
    lines
}

/// One prompt per rule that fired, in ranked order.
fn coaching_prompts(result: &AnalysisResult, actions: &[RankedAction]) -> Vec<CoachingPrompt> {
    let mut prompts: IndexMap<&str, CoachingPrompt> = IndexMap::new();
    for action in actions {
        if prompts.contains_key(action.rule_id.as_str()) {
            continue;
        }
        let trigger = result
            .findings
            .iter()
            .find(|f| f.rule_id == action.rule_id)
            .map(|f| f.trigger.clone())
            .unwrap_or_default();
        prompts.insert(
            &action.rule_id,
            CoachingPrompt {
                rule_id: action.rule_id.clone(),
                severity: action.severity,
                trigger,
            },
        );
    }
    prompts.into_values().collect()
}

fn rule_lint(issues: &[LintIssue], result: &AnalysisResult) -> Vec<ReportLine> {
    let mut lines: Vec<ReportLine> = issues.iter().map(|i| ReportLine::text(i.to_string())).collect();

    // Repeated errors for one rule collapse into a single line with a row count.
    let mut grouped: IndexMap<(String, String), usize> = IndexMap::new();
    for diag in &result.diagnostics {
        *grouped
            .entry((diag.rule_id.clone(), diag.error.to_string()))
            .or_default() += 1;
    }
    for ((rule_id, error), count) in grouped {
        let label = if count == 1 {
            format!("{}: evaluation error: {}", rule_id, error)
        } else {
            format!("{}: evaluation error: {} ({} rows)", rule_id, error, count)
        };
        lines.push(ReportLine::text(label));
    }

    if lines.is_empty() {
        lines.push(ReportLine::text(NO_LINT_ISSUES));
    }
    lines
}
