//! Typed comparison between operands.
//!
//! Coercion is picked from the operands: a boolean literal compares flags, a
//! number on either side compares numerically, a date on either side compares
//! datetimes. Anything that fails to coerce does not match.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use flightdeck_core::{parse_datetime, parse_flag, FieldValue};

use crate::dsl::{CmpOp, Literal};

const NUMERIC_TOLERANCE: f64 = 1e-9;

/// A resolved operand: a cell from the row or a literal from the condition.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Side<'a> {
    Cell(&'a FieldValue),
    Literal(&'a Literal),
}

impl Side<'_> {
    pub(crate) fn is_missing(&self) -> bool {
        match self {
            Side::Cell(value) => value.is_missing(),
            Side::Literal(Literal::Text(s)) => s.trim().is_empty(),
            Side::Literal(_) => false,
        }
    }

    fn is_bool(&self) -> bool {
        matches!(self, Side::Literal(Literal::Bool(_)))
    }

    fn is_number(&self) -> bool {
        matches!(
            self,
            Side::Cell(FieldValue::Number(_)) | Side::Literal(Literal::Number(_))
        )
    }

    fn is_date(&self) -> bool {
        matches!(self, Side::Cell(FieldValue::Date(_)))
    }

    pub(crate) fn as_number(&self) -> Option<f64> {
        match self {
            Side::Cell(value) => value.as_number(),
            Side::Literal(Literal::Number(n)) => Some(*n),
            Side::Literal(Literal::Text(s)) => FieldValue::Text(s.clone()).as_number(),
            Side::Literal(Literal::Bool(_)) => None,
        }
    }

    fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Side::Cell(value) => value.as_date(),
            Side::Literal(Literal::Text(s)) => parse_datetime(s),
            Side::Literal(_) => None,
        }
    }

    pub(crate) fn as_flag(&self) -> Option<bool> {
        match self {
            Side::Cell(value) => value.as_flag(),
            Side::Literal(Literal::Bool(b)) => Some(*b),
            Side::Literal(Literal::Number(n)) if *n == 1.0 => Some(true),
            Side::Literal(Literal::Number(n)) if *n == 0.0 => Some(false),
            Side::Literal(Literal::Text(s)) => parse_flag(s),
            Side::Literal(Literal::Number(_)) => None,
        }
    }

    /// Text form used for exact and set comparisons.
    pub(crate) fn text(&self) -> String {
        match self {
            Side::Cell(value) => value.to_string(),
            Side::Literal(Literal::Text(s)) => s.clone(),
            Side::Literal(Literal::Number(n)) => FieldValue::Number(*n).to_string(),
            Side::Literal(Literal::Bool(true)) => "TRUE".to_string(),
            Side::Literal(Literal::Bool(false)) => "FALSE".to_string(),
        }
    }
}

pub(crate) fn compare(left: Side<'_>, op: CmpOp, right: Side<'_>) -> bool {
    if left.is_missing() || right.is_missing() {
        return false;
    }

    if left.is_bool() || right.is_bool() {
        return match (left.as_flag(), right.as_flag()) {
            (Some(a), Some(b)) => match op {
                CmpOp::Eq => a == b,
                CmpOp::Ne => a != b,
                _ => false,
            },
            _ => false,
        };
    }

    if left.is_number() || right.is_number() {
        return numeric(left, op, right).unwrap_or(false);
    }

    if left.is_date() || right.is_date() {
        return dated(left, op, right).unwrap_or(false);
    }

    match op {
        CmpOp::Eq => left.text() == right.text(),
        CmpOp::Ne => left.text() != right.text(),
        _ => numeric(left, op, right)
            .or_else(|| dated(left, op, right))
            .unwrap_or(false),
    }
}

fn numeric(left: Side<'_>, op: CmpOp, right: Side<'_>) -> Option<bool> {
    let (a, b) = (left.as_number()?, right.as_number()?);
    let ordering = if (a - b).abs() <= NUMERIC_TOLERANCE {
        Ordering::Equal
    } else {
        a.partial_cmp(&b)?
    };
    Some(apply(op, ordering))
}

fn dated(left: Side<'_>, op: CmpOp, right: Side<'_>) -> Option<bool> {
    let (a, b) = (left.as_date()?, right.as_date()?);
    Some(apply(op, a.cmp(&b)))
}

fn apply(op: CmpOp, ordering: Ordering) -> bool {
    match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
    }
}

/// Set membership. Numbers compare numerically, booleans as flags and text
/// exactly (or ignoring case).
pub(crate) fn in_set(operand: Side<'_>, set: &[Literal], case_insensitive: bool) -> bool {
    set.iter().any(|item| match item {
        Literal::Number(n) => operand
            .as_number()
            .is_some_and(|v| (v - n).abs() <= NUMERIC_TOLERANCE),
        Literal::Bool(b) => operand.as_flag() == Some(*b),
        Literal::Text(t) => {
            let text = operand.text();
            if case_insensitive {
                text.to_lowercase() == t.to_lowercase()
            } else {
                text == *t
            }
        }
    })
}
