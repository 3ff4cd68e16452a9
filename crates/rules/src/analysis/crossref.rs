//! Lookups derived from the dataset once per run and shared by every rule.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{Duration, NaiveDateTime};
use flightdeck_core::{Category, Dataset, FieldValue, Row};

/// How a date cell resolved: absent, present and parsed, or present but malformed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum DateCell {
    Missing,
    Valid(NaiveDateTime),
    Malformed,
}

pub(crate) fn date_cell(row: &Row, field: &str) -> DateCell {
    let value = row.value(field);
    if value.is_missing() {
        return DateCell::Missing;
    }
    match value.as_date() {
        Some(dt) => DateCell::Valid(dt),
        None => DateCell::Malformed,
    }
}

/// Trimmed text of a present cell.
pub(crate) fn text_key(row: &Row, field: &str) -> Option<String> {
    let value = row.value(field);
    if value.is_missing() {
        None
    } else {
        Some(value.to_string().trim().to_string())
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    index: usize,
    start: NaiveDateTime,
    end: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct CrossReference {
    /// (Line, SKU) pairs with a numeric standard rate.
    standards: HashSet<(String, String)>,
    /// Schedule slots with both bounds, per line.
    slots: HashMap<String, Vec<Slot>>,
    duplicates: BTreeMap<Category, BTreeSet<usize>>,
    overlapping_rows: BTreeSet<usize>,
    overlapping_lines: BTreeSet<String>,
    /// Occurrences of (Line, Machine, Cause) in downtime.
    causes: HashMap<(String, String, String), usize>,
    /// Hourly row indices per line, ordered by `HourEndingDT` then source order.
    hourly_by_line: HashMap<String, Vec<usize>>,
    /// Hourly row index to (line, position within that line's ordering).
    hourly_position: HashMap<usize, (String, usize)>,
    /// Downtime start times per line, ascending.
    downtime_starts: HashMap<String, Vec<NaiveDateTime>>,
    /// Forecast shortfall per line as a fraction of planned cases; only
    /// lines with hourly output and a positive plan.
    shortfall: HashMap<String, f64>,
}

impl CrossReference {
    pub fn build(dataset: &Dataset) -> Self {
        let mut xref = Self::default();
        xref.index_standards(dataset.rows(Category::Standards));
        xref.index_schedule(dataset.rows(Category::Schedule));
        xref.index_downtime(dataset.rows(Category::Downtime));
        xref.index_hourly(dataset.rows(Category::Hourly));
        xref.index_forecast(dataset.rows(Category::Schedule), dataset.rows(Category::Hourly));
        for category in Category::ALL {
            let dups = duplicate_rows(category, dataset.rows(category));
            if !dups.is_empty() {
                xref.duplicates.insert(category, dups);
            }
        }
        xref
    }

    fn index_standards(&mut self, rows: &[Row]) {
        for row in rows {
            let (Some(line), Some(sku)) = (text_key(row, "Line"), text_key(row, "SKU")) else {
                continue;
            };
            if row.value("Std_CPH").as_number().is_some() {
                self.standards.insert((line, sku));
            }
        }
    }

    fn index_schedule(&mut self, rows: &[Row]) {
        for (index, row) in rows.iter().enumerate() {
            let Some(line) = text_key(row, "Line") else {
                continue;
            };
            if let (DateCell::Valid(start), DateCell::Valid(end)) =
                (date_cell(row, "StartDT"), date_cell(row, "EndDT"))
            {
                self.slots
                    .entry(line)
                    .or_default()
                    .push(Slot { index, start, end });
            }
        }

        for (line, slots) in &self.slots {
            for (i, a) in slots.iter().enumerate() {
                for b in &slots[i + 1..] {
                    if a.start < b.end && b.start < a.end {
                        self.overlapping_rows.insert(a.index);
                        self.overlapping_rows.insert(b.index);
                        self.overlapping_lines.insert(line.clone());
                    }
                }
            }
        }
    }

    fn index_downtime(&mut self, rows: &[Row]) {
        for row in rows {
            if let Some(key) = cause_key(row) {
                *self.causes.entry(key).or_default() += 1;
            }
            if let (Some(line), DateCell::Valid(start)) = (text_key(row, "Line"), date_cell(row, "StartDT")) {
                self.downtime_starts.entry(line).or_default().push(start);
            }
        }
        for starts in self.downtime_starts.values_mut() {
            starts.sort();
        }
    }

    /// Project each line's output: cases so far plus two more hours at the
    /// average of its last three hours, compared against planned cases.
    /// Blank actuals count as zero.
    fn index_forecast(&mut self, schedule: &[Row], hourly: &[Row]) {
        let mut planned: HashMap<String, f64> = HashMap::new();
        for row in schedule {
            let Some(line) = text_key(row, "Line") else {
                continue;
            };
            let cases = row
                .value("PlannedCases")
                .as_number()
                .or_else(|| row.value("Cases_Planned").as_number())
                .unwrap_or(0.0);
            *planned.entry(line).or_default() += cases;
        }

        for (line, indices) in &self.hourly_by_line {
            let plan = planned.get(line).copied().unwrap_or(0.0);
            if plan <= 0.0 || indices.is_empty() {
                continue;
            }
            let actuals: Vec<f64> = indices
                .iter()
                .map(|&i| hourly[i].value("ActualCases").as_number().unwrap_or(0.0))
                .collect();
            let recent = &actuals[actuals.len().saturating_sub(3)..];
            let rolling = recent.iter().sum::<f64>() / recent.len() as f64;
            let forecast = actuals.iter().sum::<f64>() + rolling * 2.0;
            self.shortfall.insert(line.clone(), (plan - forecast) / plan);
        }
    }

    fn index_hourly(&mut self, rows: &[Row]) {
        let mut timed: HashMap<String, Vec<(NaiveDateTime, usize)>> = HashMap::new();
        for (index, row) in rows.iter().enumerate() {
            let Some(line) = text_key(row, "Line") else {
                continue;
            };
            if let DateCell::Valid(at) = date_cell(row, "HourEndingDT") {
                timed.entry(line).or_default().push((at, index));
            }
        }
        for (line, mut entries) in timed {
            entries.sort();
            for (pos, (_, index)) in entries.iter().enumerate() {
                self.hourly_position.insert(*index, (line.clone(), pos));
            }
            self.hourly_by_line
                .insert(line, entries.into_iter().map(|(_, index)| index).collect());
        }
    }

    pub fn has_standard(&self, line: &str, sku: &str) -> bool {
        self.standards
            .contains(&(line.trim().to_string(), sku.trim().to_string()))
    }

    /// Whether some slot on `line` covers `at`, bounds inclusive.
    pub fn is_scheduled(&self, line: &str, at: NaiveDateTime) -> bool {
        self.slots
            .get(line.trim())
            .is_some_and(|slots| slots.iter().any(|s| s.start <= at && at <= s.end))
    }

    pub fn is_duplicate(&self, category: Category, index: usize) -> bool {
        self.duplicates
            .get(&category)
            .is_some_and(|rows| rows.contains(&index))
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates.values().map(BTreeSet::len).sum()
    }

    pub fn overlaps(&self, schedule_index: usize) -> bool {
        self.overlapping_rows.contains(&schedule_index)
    }

    pub fn overlapping_lines(&self) -> &BTreeSet<String> {
        &self.overlapping_lines
    }

    pub fn cause_count(&self, row: &Row) -> usize {
        cause_key(row)
            .and_then(|key| self.causes.get(&key).copied())
            .unwrap_or(0)
    }

    /// Downtime events on `line` that started within `window_hours` before
    /// `at`, both ends inclusive.
    pub fn downtime_events(&self, line: &str, at: NaiveDateTime, window_hours: u32) -> usize {
        let from = at - Duration::hours(i64::from(window_hours));
        self.downtime_starts.get(line.trim()).map_or(0, |starts| {
            let lo = starts.partition_point(|t| *t < from);
            let hi = starts.partition_point(|t| *t <= at);
            hi - lo
        })
    }

    pub fn forecast_shortfall(&self, line: &str) -> Option<f64> {
        self.shortfall.get(line.trim()).copied()
    }

    /// Hourly indices on the row's line up to and including the row, in time order.
    pub fn hourly_history(&self, hourly_index: usize) -> Option<&[usize]> {
        let (line, pos) = self.hourly_position.get(&hourly_index)?;
        self.hourly_by_line
            .get(line)
            .map(|indices| &indices[..=*pos])
    }
}

fn cause_key(row: &Row) -> Option<(String, String, String)> {
    Some((
        text_key(row, "Line")?,
        text_key(row, "Machine")?,
        text_key(row, "Cause")?,
    ))
}

/// Rows whose duplicate key is shared with another row. Rows with every key
/// field blank are never candidates.
fn duplicate_rows(category: Category, rows: &[Row]) -> BTreeSet<usize> {
    let mut groups: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        let key: Vec<String> = category
            .duplicate_key_fields()
            .iter()
            .map(|f| key_part(row.value(f)))
            .collect();
        if key.iter().all(String::is_empty) {
            continue;
        }
        groups.entry(key).or_default().push(index);
    }
    groups
        .into_values()
        .filter(|g| g.len() > 1)
        .flatten()
        .collect()
}

fn key_part(value: &FieldValue) -> String {
    if value.is_missing() {
        String::new()
    } else {
        value.to_string().trim().to_string()
    }
}
