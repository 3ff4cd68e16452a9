//! Rule-independent dataset statistics. Dataset-scoped rules read these as
//! their fields.

use flightdeck_core::{Category, Dataset, FieldValue, Row};
use serde::Serialize;

use super::crossref::{date_cell, text_key, CrossReference, DateCell};

/// Field names of [`DatasetStats::as_row`], in report order.
pub const STAT_FIELDS: &[&str] = &[
    "Schedule_Rows",
    "Hourly_Rows",
    "Downtime_Rows",
    "Standards_Rows",
    "Hourly_Without_Schedule",
    "Rows_Missing_Standards",
    "Duplicate_Candidates",
    "Overlapping_Schedule_Lines",
    "Standards_Missing_Rate",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetStats {
    #[serde(rename = "Schedule_Rows")]
    pub schedule_rows: usize,
    #[serde(rename = "Hourly_Rows")]
    pub hourly_rows: usize,
    #[serde(rename = "Downtime_Rows")]
    pub downtime_rows: usize,
    #[serde(rename = "Standards_Rows")]
    pub standards_rows: usize,
    /// Hourly rows with no schedule slot covering their hour. Rows without a
    /// line or a readable hour count as uncovered.
    #[serde(rename = "Hourly_Without_Schedule")]
    pub hourly_without_schedule: usize,
    /// Hourly rows whose (Line, SKU_Resolved) has no standard rate.
    #[serde(rename = "Rows_Missing_Standards")]
    pub rows_missing_standards: usize,
    #[serde(rename = "Duplicate_Candidates")]
    pub duplicate_candidates: usize,
    #[serde(rename = "Overlapping_Schedule_Lines")]
    pub overlapping_schedule_lines: usize,
    /// `rows_missing_standards / hourly_rows`, rounded to four places; 0 with no hourly rows.
    #[serde(rename = "Standards_Missing_Rate")]
    pub standards_missing_rate: f64,
}

impl DatasetStats {
    pub fn compute(dataset: &Dataset, xref: &CrossReference) -> Self {
        let hourly = dataset.rows(Category::Hourly);

        let hourly_without_schedule = hourly
            .iter()
            .filter(|row| {
                match (text_key(row, "Line"), date_cell(row, "HourEndingDT")) {
                    (Some(line), DateCell::Valid(at)) => !xref.is_scheduled(&line, at),
                    _ => true,
                }
            })
            .count();

        let sku_field = Category::Hourly.sku_field();
        let rows_missing_standards = hourly
            .iter()
            .filter(|row| match (text_key(row, "Line"), text_key(row, sku_field)) {
                (Some(line), Some(sku)) => !xref.has_standard(&line, &sku),
                _ => true,
            })
            .count();

        let standards_missing_rate = if hourly.is_empty() {
            0.0
        } else {
            let rate = rows_missing_standards as f64 / hourly.len() as f64;
            (rate * 10_000.0).round() / 10_000.0
        };

        Self {
            schedule_rows: dataset.rows(Category::Schedule).len(),
            hourly_rows: hourly.len(),
            downtime_rows: dataset.rows(Category::Downtime).len(),
            standards_rows: dataset.rows(Category::Standards).len(),
            hourly_without_schedule,
            rows_missing_standards,
            duplicate_candidates: xref.duplicate_count(),
            overlapping_schedule_lines: xref.overlapping_lines().len(),
            standards_missing_rate,
        }
    }

    /// Statistics as a row, so dataset rules evaluate like row rules.
    pub fn as_row(&self) -> Row {
        let counts = [
            self.schedule_rows,
            self.hourly_rows,
            self.downtime_rows,
            self.standards_rows,
            self.hourly_without_schedule,
            self.rows_missing_standards,
            self.duplicate_candidates,
            self.overlapping_schedule_lines,
        ];
        let mut row: Row = STAT_FIELDS
            .iter()
            .zip(counts)
            .map(|(name, n)| (name.to_string(), FieldValue::Number(n as f64)))
            .collect();
        row.insert(
            "Standards_Missing_Rate",
            FieldValue::Number(self.standards_missing_rate),
        );
        row
    }
}
