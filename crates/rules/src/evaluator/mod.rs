//! Condition evaluator.
//!
//! Runs a compiled [`Expr`] against one row (or the dataset statistics row)
//! and reports a tri-state outcome. Evaluation is pure: the same expression
//! and context always give the same result.
//!
//! - Comparisons with a missing operand do not match; they never error.
//! - `AND` / `OR` short-circuit left to right.
//! - Errors come only from built-in functions: a malformed date they depend
//!   on, or a call outside the scopes the function supports.

mod compare;
mod functions;

use flightdeck_core::{Category, Dataset, Row};
use serde::Serialize;

use crate::analysis::CrossReference;
use crate::dsl::{Expr, Operand};

use compare::Side;

// ── Results ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
pub enum EvaluationError {
    #[error("field '{field}' holds an unreadable date '{value}'")]
    InvalidDate { field: String, value: String },

    #[error("{function}() is not available for {context} rules")]
    UnsupportedContext {
        function: &'static str,
        context: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// The condition held; evidence lists `(field, value)` pairs from the row.
    Matched { evidence: Vec<(String, String)> },
    NotMatched,
    Error(EvaluationError),
}

impl Evaluation {
    pub fn is_match(&self) -> bool {
        matches!(self, Evaluation::Matched { .. })
    }
}

// ── Context ─────────────────────────────────────────────────────────

/// Everything a condition can see while it runs.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub row: &'a Row,
    /// Category of `row`; `None` when `row` is the dataset statistics row.
    pub category: Option<Category>,
    pub index: usize,
    pub dataset: &'a Dataset,
    pub xref: &'a CrossReference,
}

impl<'a> EvalContext<'a> {
    pub fn for_row(
        category: Category,
        index: usize,
        row: &'a Row,
        dataset: &'a Dataset,
        xref: &'a CrossReference,
    ) -> Self {
        Self {
            row,
            category: Some(category),
            index,
            dataset,
            xref,
        }
    }

    pub fn for_dataset(stats: &'a Row, dataset: &'a Dataset, xref: &'a CrossReference) -> Self {
        Self {
            row: stats,
            category: None,
            index: 0,
            dataset,
            xref,
        }
    }
}

// ── Evaluation ──────────────────────────────────────────────────────

/// Evaluate `expr`; on a match, collect `evidence_fields` from the row.
pub fn evaluate(expr: &Expr, ctx: &EvalContext<'_>, evidence_fields: &[String]) -> Evaluation {
    match eval(expr, ctx) {
        Ok(true) => Evaluation::Matched {
            evidence: evidence_fields
                .iter()
                .map(|f| (f.clone(), ctx.row.value(f).to_string()))
                .collect(),
        },
        Ok(false) => Evaluation::NotMatched,
        Err(e) => Evaluation::Error(e),
    }
}

fn eval(expr: &Expr, ctx: &EvalContext<'_>) -> Result<bool, EvaluationError> {
    match expr {
        Expr::Constant(b) => Ok(*b),
        Expr::Compare { left, op, right } => {
            Ok(compare::compare(side(left, ctx), *op, side(right, ctx)))
        }
        Expr::IsMissing { operand, negated } => Ok(side(operand, ctx).is_missing() != *negated),
        Expr::InSet {
            operand,
            set,
            negated,
            case_insensitive,
        } => {
            let value = side(operand, ctx);
            if value.is_missing() {
                return Ok(false);
            }
            Ok(compare::in_set(value, set, *case_insensitive) != *negated)
        }
        Expr::Call(call) => functions::call(call, ctx),
        Expr::Not(inner) => eval(inner, ctx).map(|b| !b),
        Expr::And(a, b) => Ok(eval(a, ctx)? && eval(b, ctx)?),
        Expr::Or(a, b) => Ok(eval(a, ctx)? || eval(b, ctx)?),
    }
}

fn side<'a>(operand: &'a Operand, ctx: &EvalContext<'a>) -> Side<'a> {
    match operand {
        Operand::Field(name) => Side::Cell(ctx.row.value(name)),
        Operand::Literal(lit) => Side::Literal(lit),
    }
}
