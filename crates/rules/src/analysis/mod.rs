//! Analysis aggregator: runs every enabled, valid rule over the dataset.
//!
//! Row-scoped rules run once per row of their category; dataset-scoped rules
//! run once against [`DatasetStats`]. The pass is read-only and deterministic:
//! the same registry and dataset always give the same [`AnalysisResult`],
//! whether rules run sequentially or on a rayon pool.

pub(crate) mod crossref;
mod stats;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use flightdeck_core::config::AnalysisConfig;
use flightdeck_core::{Category, Dataset, Row};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::evaluator::{evaluate, EvalContext, Evaluation, EvaluationError};
use crate::loader::RuleRegistry;
use crate::ranking::render_recommendation;
use crate::schema::{CompiledRule, Scope, Severity};
use crate::validation::{absent_scope_issues, LintIssue};

pub use crossref::CrossReference;
pub use stats::{DatasetStats, STAT_FIELDS};

// ── Findings ────────────────────────────────────────────────────────

/// Where a finding was raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub category: Category,
    pub index: usize,
    /// Non-blank location fields of the row joined with `,`, e.g. `Line 1,SKU-001`.
    pub label: String,
}

impl Location {
    pub fn for_row(category: Category, index: usize, row: &Row) -> Self {
        let label = category
            .location_fields()
            .iter()
            .map(|f| row.value(f))
            .filter(|v| !v.is_missing())
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self {
            category,
            index,
            label,
        }
    }

    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            "Unknown".to_string()
        } else {
            self.label.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub rule_id: String,
    pub position: usize,
    pub severity: Severity,
    pub scope: Scope,
    /// Recommendation with placeholders filled from the matched row.
    pub message: String,
    /// What tripped the rule: its description, or the condition if it has none.
    pub trigger: String,
    pub evidence: Vec<(String, String)>,
    /// `None` for dataset-wide findings.
    pub location: Option<Location>,
}

/// An evaluation error for one rule on one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub rule_id: String,
    pub position: usize,
    pub location: Option<Location>,
    pub error: EvaluationError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(
                f,
                "{}: {} row {}: {}",
                self.rule_id,
                loc.category,
                loc.index + 1,
                self.error
            ),
            None => write!(f, "{}: {}", self.rule_id, self.error),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResult {
    pub stats: DatasetStats,
    /// In rule order, then row order.
    pub findings: Vec<Finding>,
    /// Hits per evaluated rule, in rule order; rules that never matched show 0.
    pub rule_hits: IndexMap<String, usize>,
    pub diagnostics: Vec<Diagnostic>,
    /// Enabled rules skipped because their category is absent from the dataset.
    pub scope_issues: Vec<LintIssue>,
    /// Rules not evaluated because the run was interrupted.
    pub skipped: Vec<String>,
    pub partial: bool,
}

struct RuleOutcome {
    findings: Vec<Finding>,
    diagnostics: Vec<Diagnostic>,
}

// ── Analyzer ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    parallel: bool,
    /// Worker threads for parallel runs; 0 uses rayon's global pool.
    threads: usize,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new().with_parallelism(config.parallel, config.threads)
    }

    pub fn with_parallelism(mut self, parallel: bool, threads: usize) -> Self {
        self.parallel = parallel;
        self.threads = threads;
        self
    }

    pub fn analyze(&self, registry: &RuleRegistry, dataset: &Dataset) -> AnalysisResult {
        self.analyze_until(registry, dataset, || false)
    }

    /// Like [`analyze`](Self::analyze), checking `stop` before each rule.
    /// Once it returns true no further rule starts; the result is marked
    /// partial and lists the rules that did not run.
    pub fn analyze_until<F>(&self, registry: &RuleRegistry, dataset: &Dataset, stop: F) -> AnalysisResult
    where
        F: Fn() -> bool + Sync,
    {
        let xref = CrossReference::build(dataset);
        let stats = DatasetStats::compute(dataset, &xref);
        let stats_row = stats.as_row();

        let enabled = registry.enabled_rules();
        let scope_issues = absent_scope_issues(&enabled, &dataset.present_categories());
        for issue in &scope_issues {
            warn!(rule_id = %issue.rule_id, reason = %issue.reason, "rule skipped");
        }
        let runnable: Vec<&CompiledRule> = enabled
            .into_iter()
            .filter(|r| r.rule.scope.category().map_or(true, |c| dataset.is_present(c)))
            .collect();

        info!(
            rules = runnable.len(),
            rows = dataset.total_rows(),
            parallel = self.parallel,
            "starting analysis"
        );

        let stopped = AtomicBool::new(false);
        let run = |rule: &&CompiledRule| -> Option<RuleOutcome> {
            if stopped.load(Ordering::SeqCst) || stop() {
                stopped.store(true, Ordering::SeqCst);
                return None;
            }
            Some(run_rule(rule, dataset, &xref, &stats_row))
        };

        let outcomes: Vec<Option<RuleOutcome>> = if self.parallel {
            let work = || -> Vec<Option<RuleOutcome>> { runnable.par_iter().map(run).collect() };
            if self.threads > 0 {
                match rayon::ThreadPoolBuilder::new()
                    .num_threads(self.threads)
                    .build()
                {
                    Ok(pool) => pool.install(work),
                    Err(e) => {
                        warn!(error = %e, "failed to build analysis thread pool, using global pool");
                        work()
                    }
                }
            } else {
                work()
            }
        } else {
            runnable.iter().map(run).collect()
        };

        let mut result = AnalysisResult {
            stats,
            scope_issues,
            ..Default::default()
        };
        for (rule, outcome) in runnable.iter().zip(outcomes) {
            match outcome {
                Some(outcome) => {
                    result
                        .rule_hits
                        .insert(rule.id().to_string(), outcome.findings.len());
                    result.findings.extend(outcome.findings);
                    result.diagnostics.extend(outcome.diagnostics);
                }
                None => result.skipped.push(rule.id().to_string()),
            }
        }
        result.partial = !result.skipped.is_empty();

        info!(
            findings = result.findings.len(),
            diagnostics = result.diagnostics.len(),
            skipped = result.skipped.len(),
            "analysis complete"
        );
        result
    }
}

fn run_rule(
    compiled: &CompiledRule,
    dataset: &Dataset,
    xref: &CrossReference,
    stats_row: &Row,
) -> RuleOutcome {
    let rule = &compiled.rule;
    let evidence_fields = compiled.evidence_fields();
    let trigger = if rule.description.trim().is_empty() {
        rule.condition.clone()
    } else {
        rule.description.clone()
    };
    let mut outcome = RuleOutcome {
        findings: Vec::new(),
        diagnostics: Vec::new(),
    };

    let mut record = |row: &Row, location: Option<Location>, evaluation: Evaluation| match evaluation {
        Evaluation::Matched { evidence } => outcome.findings.push(Finding {
            rule_id: rule.id.clone(),
            position: rule.position,
            severity: rule.severity,
            scope: rule.scope,
            message: render_recommendation(&rule.message, row),
            trigger: trigger.clone(),
            evidence,
            location,
        }),
        Evaluation::NotMatched => {}
        Evaluation::Error(error) => outcome.diagnostics.push(Diagnostic {
            rule_id: rule.id.clone(),
            position: rule.position,
            location,
            error,
        }),
    };

    match rule.scope.category() {
        Some(category) => {
            for (index, row) in dataset.rows(category).iter().enumerate() {
                if !rule.applies_to.matches(category, row) {
                    continue;
                }
                let ctx = EvalContext::for_row(category, index, row, dataset, xref);
                let evaluation = evaluate(&compiled.expr, &ctx, &evidence_fields);
                record(row, Some(Location::for_row(category, index, row)), evaluation);
            }
        }
        None => {
            let ctx = EvalContext::for_dataset(stats_row, dataset, xref);
            let evaluation = evaluate(&compiled.expr, &ctx, &evidence_fields);
            record(stats_row, None, evaluation);
        }
    }

    debug!(
        rule_id = %rule.id,
        scope = %rule.scope,
        findings = outcome.findings.len(),
        diagnostics = outcome.diagnostics.len(),
        "rule evaluated"
    );
    outcome
}
