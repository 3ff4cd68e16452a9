//! Per-record lint checks, run in order; the first failing check wins.

use std::collections::HashMap;

use flightdeck_core::parse_flag;

use super::fuzzy::fuzzy_match;
use super::LintIssue;
use crate::dsl::{compile_for_scope, Expr, ParseErrorKind};
use crate::schema::{AppliesTo, CompiledRule, Rule, RuleRecord, Scope, Severity};

/// Lint one record. `first_seen` maps rule ids to the position that
/// introduced them and is updated for every record carrying an id.
pub(super) fn check_record(
    record: &RuleRecord,
    position: usize,
    first_seen: &mut HashMap<String, usize>,
) -> Result<CompiledRule, LintIssue> {
    let issue = |reason: String| LintIssue::new(record, position, reason);

    // ── 1. Required fields and identity ─────────────────────────────
    let missing: Vec<&str> = [
        ("RuleID", &record.rule_id),
        ("Severity", &record.severity),
        ("Scope", &record.scope),
        ("IfLogic", &record.condition),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect();

    if !record.rule_id.trim().is_empty() {
        if let Some(first) = first_seen.get(record.rule_id.trim()) {
            return Err(issue(format!(
                "duplicate RuleID (first defined at position {})",
                first + 1
            )));
        }
        first_seen.insert(record.rule_id.trim().to_string(), position);
    }

    if !missing.is_empty() {
        return Err(issue(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )));
    }

    // ── 2. Enumerations ─────────────────────────────────────────────
    let severity: Severity = record.severity.parse().map_err(|_| {
        issue(format!("unknown severity '{}'", record.severity))
            .with_suggestion(fuzzy_match(&record.severity, Severity::NAMES))
    })?;

    let scope: Scope = record.scope.parse().map_err(|_| {
        issue(format!("unknown scope '{}'", record.scope))
            .with_suggestion(fuzzy_match(&record.scope, Scope::NAMES))
    })?;

    let enabled = if record.enabled.trim().is_empty() {
        false
    } else {
        parse_flag(&record.enabled).ok_or_else(|| {
            issue(format!(
                "Enabled must be TRUE or FALSE, got '{}'",
                record.enabled
            ))
        })?
    };

    // ── 3 & 4. Condition parses and resolves against the scope ──────
    let expr = compile_for_scope(&record.condition, scope).map_err(|e| match &e.kind {
        ParseErrorKind::UnknownField(field) => {
            let legal = scope.legal_fields();
            issue(format!("field '{}' is not defined for {} rules", field, scope))
                .with_suggestion(fuzzy_match(field, &legal))
        }
        _ => issue(format!("condition does not parse: {}", e)),
    })?;

    check_functions(&expr, scope).map_err(issue)?;
    check_required_fields(record, &expr, scope).map_err(|(reason, suggestion)| {
        issue(reason).with_suggestion(suggestion)
    })?;
    let applies_to = AppliesTo::from_record(record);
    check_applies_to(&applies_to, scope).map_err(issue)?;

    let rule = Rule {
        id: record.rule_id.trim().to_string(),
        position,
        enabled,
        severity,
        scope,
        condition: record.condition.clone(),
        message: record.message.clone(),
        description: record.description.clone(),
        escalation: record.escalation.clone(),
        required_fields: record.required_fields.clone(),
        applies_to,
    };
    Ok(CompiledRule { rule, expr })
}

fn check_functions(expr: &Expr, scope: Scope) -> Result<(), String> {
    match expr.calls().into_iter().find(|c| !c.supports(scope.category())) {
        Some(call) => Err(format!(
            "{}() is not available for {} rules",
            call.name(),
            scope
        )),
        None => Ok(()),
    }
}

fn check_applies_to(applies_to: &AppliesTo, scope: Scope) -> Result<(), String> {
    if applies_to.is_unfiltered() {
        return Ok(());
    }
    let Some(category) = scope.category() else {
        return Err(format!("row filters do not apply to {} rules", scope));
    };
    match applies_to
        .active(category)
        .into_iter()
        .find(|(_, field, _)| !category.is_known_field(field))
    {
        Some((column, _, _)) => Err(format!("{} does not apply to {} rules", column, scope)),
        None => Ok(()),
    }
}

fn check_required_fields(
    record: &RuleRecord,
    expr: &Expr,
    scope: Scope,
) -> Result<(), (String, Option<&'static str>)> {
    if record.required_fields.is_empty() {
        return Ok(());
    }

    if let Some(field) = record
        .required_fields
        .iter()
        .find(|f| !scope.is_legal_field(f))
    {
        let legal = scope.legal_fields();
        return Err((
            format!(
                "required field '{}' is not defined for {} rules",
                field, scope
            ),
            fuzzy_match(field, &legal),
        ));
    }

    if let Some(field) = expr
        .fields()
        .into_iter()
        .find(|f| !record.required_fields.contains(f))
    {
        return Err((
            format!("RequiredFields does not list '{}' used by the condition", field),
            None,
        ));
    }

    Ok(())
}
