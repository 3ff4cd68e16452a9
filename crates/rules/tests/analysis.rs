//! End-to-end runs: registry load, analysis, ranking and report assembly
//! against small in-memory plant datasets.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};
use flightdeck_core::Dataset;
use flightdeck_rules::ranking::COACHING_SENTENCE;
use flightdeck_rules::report::{SectionBody, RECOMMENDED_ACTIONS, RULE_LINT};
use flightdeck_rules::schema::{RuleRecord, Severity};
use flightdeck_rules::{AnalysisResult, Analyzer, Report, RuleRegistry, RuleSource};
use serde_json::json;
use tempfile::TempDir;

fn record(id: &str, severity: &str, scope: &str, condition: &str, message: &str) -> RuleRecord {
    RuleRecord {
        rule_id: id.to_string(),
        enabled: "TRUE".to_string(),
        severity: severity.to_string(),
        scope: scope.to_string(),
        condition: condition.to_string(),
        message: message.to_string(),
        ..Default::default()
    }
}

fn registry(records: Vec<RuleRecord>) -> RuleRegistry {
    RuleRegistry::from_records(records, RuleSource::Table)
}

fn standards_dataset() -> Dataset {
    Dataset::from_json(&json!({
        "standards": [
            { "Line": "Line 1", "SKU": "SKU-001", "ProductName": "Cola 12pk", "Std_CPH": null },
            { "Line": "Line 1", "SKU": "SKU-002", "ProductName": "Cola 24pk", "Std_CPH": 420 },
            { "Line": "Line 2", "SKU": "SKU-001", "ProductName": "Cola 12pk", "Std_CPH": 380 }
        ]
    }))
    .unwrap()
}

fn plant_dataset() -> Dataset {
    Dataset::from_json(&json!({
        "schedule": [
            { "Line": "Line 1", "StartDT": "2025-08-08 06:00", "EndDT": "2025-08-08 14:00",
              "SKU": "SKU-001", "Cases_Planned": 800, "Shifts_Planned": 1, "Cases_Completed": 0 },
            { "Line": "Line 1", "StartDT": "2025-08-08 13:00", "EndDT": "2025-08-08 22:00",
              "SKU": "SKU-002", "Cases_Planned": 600, "Shifts_Planned": 1, "Cases_Completed": 610 },
            { "Line": "Line 2", "StartDT": "2025-08-08 06:00", "EndDT": "2025-08-08 14:00",
              "SKU": "SKU-001", "Cases_Planned": 500, "Shifts_Planned": 1 }
        ],
        "hourly": [
            { "Line": "Line 1", "HourEndingDT": "2025-08-08 07:00", "ActualCases": 90,
              "SKU_Resolved": "SKU-001", "Std_CPH": 100, "RateAttain_100": 90 },
            { "Line": "Line 1", "HourEndingDT": "2025-08-08 08:00", "ActualCases": 0,
              "SKU_Resolved": "SKU-001", "Std_CPH": 100, "RateAttain_100": 0 },
            { "Line": "Line 3", "HourEndingDT": "2025-08-08 08:00", "ActualCases": 40,
              "SKU_Resolved": "SKU-009", "RateAttain_100": 40 }
        ],
        "downtime": [
            { "Line": "Line 1", "Machine": "Filler", "Cause": "Jam", "Minutes": 25,
              "StartDT": "2025-08-08 07:10", "EndDT": "2025-08-08 07:35" },
            { "Line": "Line 1", "Machine": "Filler", "Cause": "Jam", "Minutes": 12,
              "StartDT": "2025-08-08 09:00", "EndDT": "2025-08-08 09:12" }
        ],
        "standards": [
            { "Line": "Line 1", "SKU": "SKU-001", "Std_CPH": 100 },
            { "Line": "Line 1", "SKU": "SKU-002", "Std_CPH": 120 }
        ]
    }))
    .unwrap()
}

fn plant_rules() -> Vec<RuleRecord> {
    vec![
        record(
            "R1_NO_OUTPUT",
            "Warning",
            "Schedule",
            "Cases_Completed = 0 AND Shifts_Planned > 0",
            "Review the start-up plan for {Line}.",
        ),
        record(
            "R2_IDLE_HOUR",
            "Urgent",
            "Hourly",
            "ActualCases = 0",
            "Check staffing on {Line} at {HourEndingDT}.",
        ),
        record(
            "R3_UNSCHEDULED",
            "Warning",
            "Hourly",
            "NO_SCHEDULE()",
            "Confirm the schedule for {Line}.",
        ),
        record(
            "R4_REPEAT_JAM",
            "Info",
            "Downtime",
            "REPEAT_CAUSE(2)",
            "Issue a write-up to the crew on {Machine}.",
        ),
        record(
            "R5_OVERLAP",
            "Urgent",
            "Schedule",
            "SCHEDULE_OVERLAP()",
            "Resolve overlapping runs on {Line}.",
        ),
        record(
            "R6_LOW_VOLUME",
            "Info",
            "Dataset",
            "Hourly_Rows < 10",
            "Log every hour of the shift.",
        ),
    ]
}

// ── Worked examples ─────────────────────────────────────────────────

#[test]
fn missing_standard_yields_one_ranked_action() {
    let registry = registry(vec![record(
        "R2_MISSING_STANDARD",
        "Urgent",
        "Standards",
        "SKU IS NOT MISSING AND Std_CPH IS MISSING",
        "Add a standard rate for {SKU} on {Line}.",
    )]);
    let dataset = standards_dataset();

    let result = Analyzer::new().analyze(&registry, &dataset);
    assert_eq!(result.findings.len(), 1);
    assert!(result.diagnostics.is_empty());

    let finding = &result.findings[0];
    assert_eq!(finding.severity, Severity::Urgent);
    assert_eq!(finding.location.as_ref().unwrap().label, "Line 1,SKU-001");

    let generated_at = Utc.with_ymd_and_hms(2025, 8, 8, 6, 0, 0).unwrap();
    let report = Report::build(&registry, &result, generated_at, 10);
    assert_eq!(report.actions.len(), 1);
    assert_eq!(
        report.actions[0].line(),
        "Urgent: Add a standard rate for SKU-001 on Line 1. (Line 1,SKU-001)"
    );
}

#[test]
fn unknown_severity_is_linted_and_never_evaluated() {
    let registry = registry(vec![record(
        "R9_CRITICAL",
        "Critical",
        "Standards",
        "Std_CPH IS MISSING",
        "Unused.",
    )]);

    let result = Analyzer::new().analyze(&registry, &standards_dataset());
    assert_eq!(registry.lint_issues().len(), 1);
    assert_eq!(registry.lint_issues()[0].rule_id, "R9_CRITICAL");
    assert!(result.findings.is_empty());

    let report = Report::build(&registry, &result, Utc::now(), 10);
    let SectionBody::Lines(lines) = &report.section(RULE_LINT).unwrap().body else {
        panic!("lint section holds lines");
    };
    assert_eq!(lines.len(), 1);
    assert!(lines[0].label.starts_with("R9_CRITICAL: "));
}

#[test]
fn absent_operand_does_not_match() {
    let registry = registry(vec![record(
        "R1_NO_OUTPUT",
        "Warning",
        "Schedule",
        "Cases_Completed = 0 AND Shifts_Planned > 0",
        "Review the start-up plan for {Line}.",
    )]);
    let dataset = Dataset::from_json(&json!({
        "schedule": [{ "Line": "Line 2", "Shifts_Planned": 1 }]
    }))
    .unwrap();

    let result = Analyzer::new().analyze(&registry, &dataset);
    assert!(result.findings.is_empty());
    assert!(result.diagnostics.is_empty());
    assert_eq!(result.rule_hits["R1_NO_OUTPUT"], 0);
}

// ── Whole-plant runs ────────────────────────────────────────────────

#[test]
fn plant_run_ranks_by_severity_then_rule_order() {
    let registry = registry(plant_rules());
    let result = Analyzer::new().analyze(&registry, &plant_dataset());

    assert!(registry.lint_issues().is_empty());
    assert!(!result.partial);
    assert_eq!(result.rule_hits["R1_NO_OUTPUT"], 1);
    assert_eq!(result.rule_hits["R2_IDLE_HOUR"], 1);
    assert_eq!(result.rule_hits["R3_UNSCHEDULED"], 1);
    assert_eq!(result.rule_hits["R4_REPEAT_JAM"], 2);
    assert_eq!(result.rule_hits["R5_OVERLAP"], 2);
    assert_eq!(result.rule_hits["R6_LOW_VOLUME"], 1);

    let report = Report::build(&registry, &result, Utc::now(), 3);
    let ids: Vec<&str> = report.actions.iter().map(|a| a.rule_id.as_str()).collect();
    assert_eq!(
        ids,
        [
            "R2_IDLE_HOUR",
            "R5_OVERLAP",
            "R5_OVERLAP",
            "R1_NO_OUTPUT",
            "R3_UNSCHEDULED",
            "R4_REPEAT_JAM",
            "R4_REPEAT_JAM",
            "R6_LOW_VOLUME",
        ]
    );
    assert_eq!(report.actions[7].location, "Dataset");

    // Punitive wording is replaced before it reaches the report.
    assert!(report
        .actions
        .iter()
        .filter(|a| a.rule_id == "R4_REPEAT_JAM")
        .all(|a| a.message == COACHING_SENTENCE));

    let SectionBody::Lines(top) = &report.section(RECOMMENDED_ACTIONS).unwrap().body else {
        panic!("actions section holds lines");
    };
    assert_eq!(top.len(), 3);
}

#[test]
fn parallel_run_matches_sequential_run() {
    let registry = registry(plant_rules());
    let dataset = plant_dataset();

    let sequential = Analyzer::new().analyze(&registry, &dataset);
    let parallel = Analyzer::new()
        .with_parallelism(true, 2)
        .analyze(&registry, &dataset);
    let again = Analyzer::new().analyze(&registry, &dataset);

    assert_eq!(sequential.findings, parallel.findings);
    assert_eq!(sequential.rule_hits, parallel.rule_hits);
    assert_eq!(sequential.findings, again.findings);

    let at = Utc.with_ymd_and_hms(2025, 8, 8, 6, 0, 0).unwrap();
    assert_eq!(
        Report::build(&registry, &sequential, at, 10).render_text(),
        Report::build(&registry, &parallel, at, 10).render_text()
    );
}

#[test]
fn snapshot_round_trip_preserves_findings() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("rules.yaml");
    let dataset = plant_dataset();

    let original = registry(plant_rules());
    original
        .write_snapshot(&path, Utc::now())
        .expect("write snapshot");
    let reloaded = RuleRegistry::load_snapshot(&path).expect("reload snapshot");

    let before = Analyzer::new().analyze(&original, &dataset);
    let after = Analyzer::new().analyze(&reloaded, &dataset);
    assert_eq!(before.findings, after.findings);
}

#[test]
fn interrupted_run_is_partial() {
    let registry = registry(plant_rules());
    let checks = AtomicUsize::new(0);

    let result = Analyzer::new().analyze_until(&registry, &plant_dataset(), || {
        checks.fetch_add(1, Ordering::SeqCst) >= 2
    });

    assert!(result.partial);
    assert_eq!(result.skipped.len(), 4);
    assert_eq!(result.skipped[0], "R3_UNSCHEDULED");
    assert!(result.findings.iter().all(|f| f.rule_id == "R1_NO_OUTPUT" || f.rule_id == "R2_IDLE_HOUR"));

    let report = Report::build(&registry, &result, Utc::now(), 10);
    assert!(report.partial);
    assert!(report.render_text().contains("Partial: analysis was interrupted"));
}

#[test]
fn rules_for_absent_categories_become_scope_issues() {
    let registry = registry(plant_rules());
    let dataset = standards_dataset();

    let result = Analyzer::new().analyze(&registry, &dataset);
    let skipped: Vec<&str> = result
        .scope_issues
        .iter()
        .map(|i| i.rule_id.as_str())
        .collect();
    assert_eq!(
        skipped,
        ["R1_NO_OUTPUT", "R2_IDLE_HOUR", "R3_UNSCHEDULED", "R4_REPEAT_JAM", "R5_OVERLAP"]
    );
    // Dataset-wide rules still run: there are no hourly rows at all.
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].rule_id, "R6_LOW_VOLUME");
}

#[test]
fn snapshot_round_trip_keeps_positions_past_invalid_rules() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("rules.json");
    let dataset = plant_dataset();

    let original = registry(vec![
        record("A_IDLE", "Urgent", "Hourly", "ActualCases = 0", "Check {Line}."),
        record("B_CRITICAL", "Critical", "Hourly", "ActualCases = 0", "Unused."),
        record("C_UNSCHEDULED", "Urgent", "Hourly", "NO_SCHEDULE()", "Confirm {Line}."),
    ]);
    assert_eq!(original.lint_issues().len(), 1);
    assert_eq!(original.get("C_UNSCHEDULED").unwrap().rule.position, 2);

    assert_eq!(original.write_snapshot(&path, Utc::now()).unwrap(), 2);
    let reloaded = RuleRegistry::load_snapshot(&path).expect("reload snapshot");
    assert_eq!(reloaded.get("C_UNSCHEDULED").unwrap().rule.position, 2);

    let before = Analyzer::new().analyze(&original, &dataset);
    let after = Analyzer::new().analyze(&reloaded, &dataset);
    assert_eq!(before.findings, after.findings);

    let at = Utc.with_ymd_and_hms(2025, 8, 8, 6, 0, 0).unwrap();
    let ranked = |r: &RuleRegistry, result: &AnalysisResult| {
        Report::build(r, result, at, 10)
            .actions
            .iter()
            .map(|a| (a.rule_id.clone(), a.location.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(ranked(&original, &before), ranked(&reloaded, &after));
}

#[test]
fn applies_to_filters_limit_rows_and_survive_export() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("rules.yaml");
    let dataset = plant_dataset();

    let mut line_one = record(
        "R_LOGGED",
        "Info",
        "Hourly",
        "ActualCases >= 0",
        "Hour logged on {Line}.",
    );
    line_one.applies_to_line = "Line 1".to_string();
    let mut filler = record("R_FILLER", "Info", "Downtime", "Minutes > 0", "Stop on {Machine}.");
    filler.applies_to_machine = "Capper, Filler".to_string();
    let mut any_sku = record("R_ANY", "Info", "Schedule", "Shifts_Planned > 0", "Run on {Line}.");
    any_sku.applies_to_sku = "*".to_string();
    let mut sku_one = record("R_SKU", "Info", "Schedule", "Shifts_Planned > 0", "Run on {Line}.");
    sku_one.applies_to_sku = "SKU-002".to_string();

    let original = registry(vec![line_one, filler, any_sku, sku_one]);
    assert!(original.lint_issues().is_empty());

    let result = Analyzer::new().analyze(&original, &dataset);
    assert_eq!(result.rule_hits["R_LOGGED"], 2);
    assert_eq!(result.rule_hits["R_FILLER"], 2);
    assert_eq!(result.rule_hits["R_ANY"], 3);
    assert_eq!(result.rule_hits["R_SKU"], 1);
    assert!(result
        .findings
        .iter()
        .filter(|f| f.rule_id == "R_LOGGED")
        .all(|f| f.message == "Hour logged on Line 1."));

    original.write_snapshot(&path, Utc::now()).expect("write snapshot");
    let reloaded = RuleRegistry::load_snapshot(&path).expect("reload snapshot");
    let again = Analyzer::new().analyze(&reloaded, &dataset);
    assert_eq!(result.findings, again.findings);
}

#[test]
fn runaway_condition_is_linted_while_other_rules_run() {
    let deep = format!("{}ActualCases = 0{}", "(".repeat(3000), ")".repeat(3000));
    let registry = registry(vec![
        record("R_DEEP", "Urgent", "Hourly", &deep, "Unused."),
        record("R_IDLE", "Urgent", "Hourly", "ActualCases = 0", "Check {Line}."),
    ]);

    assert_eq!(registry.lint_issues().len(), 1);
    assert_eq!(registry.lint_issues()[0].rule_id, "R_DEEP");
    assert!(registry.lint_issues()[0].reason.contains("nests deeper"));

    let result = Analyzer::new().analyze(&registry, &plant_dataset());
    assert_eq!(result.rule_hits["R_IDLE"], 1);
    assert!(result.findings.iter().all(|f| f.rule_id == "R_IDLE"));
}
