//! Built-in cross-reference predicates.

use flightdeck_core::Category;

use crate::analysis::crossref::{date_cell, text_key, DateCell};
use crate::dsl::Call;

use super::{EvalContext, EvaluationError};

pub(crate) fn call(function: &Call, ctx: &EvalContext<'_>) -> Result<bool, EvaluationError> {
    if !function.supports(ctx.category) {
        return Err(EvaluationError::UnsupportedContext {
            function: function.name(),
            context: ctx
                .category
                .map(|c| c.to_string())
                .unwrap_or_else(|| "Dataset".to_string()),
        });
    }

    match function {
        Call::NoStandard => Ok(no_standard(ctx)),
        Call::NoSchedule => no_schedule(ctx),
        Call::Duplicate => Ok(ctx
            .category
            .is_some_and(|c| ctx.xref.is_duplicate(c, ctx.index))),
        Call::ScheduleOverlap => schedule_overlap(ctx),
        Call::RepeatCause { min } => Ok(ctx.xref.cause_count(ctx.row) >= *min),
        Call::ConsecBelow {
            field,
            threshold,
            hours,
        } => consec_below(ctx, field, *threshold, *hours),
        Call::RollingCount { window_hours, min } => rolling_count(ctx, *window_hours, *min),
        Call::ForecastShortfall { pct } => Ok(text_key(ctx.row, "Line")
            .and_then(|line| ctx.xref.forecast_shortfall(&line))
            .is_some_and(|gap| gap >= *pct)),
    }
}

/// A row with no line or SKU has no standard to find.
fn no_standard(ctx: &EvalContext<'_>) -> bool {
    let sku_field = ctx.category.map_or("SKU", |c| c.sku_field());
    match (text_key(ctx.row, "Line"), text_key(ctx.row, sku_field)) {
        (Some(line), Some(sku)) => !ctx.xref.has_standard(&line, &sku),
        _ => true,
    }
}

fn no_schedule(ctx: &EvalContext<'_>) -> Result<bool, EvaluationError> {
    let hour = checked_date(ctx, "HourEndingDT")?;
    Ok(match (text_key(ctx.row, "Line"), hour) {
        (Some(line), Some(at)) => !ctx.xref.is_scheduled(&line, at),
        _ => true,
    })
}

fn schedule_overlap(ctx: &EvalContext<'_>) -> Result<bool, EvaluationError> {
    checked_date(ctx, "StartDT")?;
    checked_date(ctx, "EndDT")?;
    Ok(ctx.xref.overlaps(ctx.index))
}

fn consec_below(
    ctx: &EvalContext<'_>,
    field: &str,
    threshold: f64,
    hours: usize,
) -> Result<bool, EvaluationError> {
    checked_date(ctx, "HourEndingDT")?;
    let Some(history) = ctx.xref.hourly_history(ctx.index) else {
        return Ok(false);
    };
    if history.len() < hours {
        return Ok(false);
    }
    let rows = ctx.dataset.rows(Category::Hourly);
    Ok(history[history.len() - hours..].iter().all(|&i| {
        rows.get(i)
            .and_then(|row| row.value(field).as_number())
            .is_some_and(|v| v < threshold)
    }))
}

/// The window ends at the row's own time: `HourEndingDT` for hourly rows,
/// `StartDT` for downtime rows.
fn rolling_count(ctx: &EvalContext<'_>, window_hours: u32, min: usize) -> Result<bool, EvaluationError> {
    let anchor_field = match ctx.category {
        Some(Category::Hourly) => "HourEndingDT",
        _ => "StartDT",
    };
    let anchor = checked_date(ctx, anchor_field)?;
    Ok(match (text_key(ctx.row, "Line"), anchor) {
        (Some(line), Some(at)) => ctx.xref.downtime_events(&line, at, window_hours) >= min,
        _ => false,
    })
}

/// A date the function depends on: absent is fine, malformed is an error.
fn checked_date(
    ctx: &EvalContext<'_>,
    field: &str,
) -> Result<Option<chrono::NaiveDateTime>, EvaluationError> {
    match date_cell(ctx.row, field) {
        DateCell::Missing => Ok(None),
        DateCell::Valid(at) => Ok(Some(at)),
        DateCell::Malformed => Err(EvaluationError::InvalidDate {
            field: field.to_string(),
            value: ctx.row.value(field).to_string(),
        }),
    }
}
