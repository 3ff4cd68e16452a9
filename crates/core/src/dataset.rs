use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, FlightDeckError};
use crate::value::{parse_datetime, FieldValue, Row};

/// Row categories a dataset is made of. Declaration order is report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Schedule,
    Hourly,
    Downtime,
    Standards,
}

/// How the dataset boundary interprets a cell for a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Date,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Text }
}

const fn number(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Number }
}

const fn date(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Date }
}

// Schedule rows come from both the authored schedule table and the
// consolidated daily production schedule, so both column sets are legal.
const SCHEDULE_FIELDS: &[FieldSpec] = &[
    text("RowID"),
    date("Date"),
    text("Shift"),
    text("Line"),
    date("StartDT"),
    date("EndDT"),
    text("Order"),
    text("SKU"),
    text("Description"),
    number("PlannedCases"),
    number("Cases_Planned"),
    number("Shifts_Planned"),
    number("Target_Per_Shift"),
    number("Cases_Completed"),
    number("Percent_Complete"),
    text("WorkOrderMade"),
    text("SourceSheet"),
    text("Notes"),
];

const HOURLY_FIELDS: &[FieldSpec] = &[
    text("RowID"),
    date("Date"),
    text("Shift"),
    text("Line"),
    date("HourEndingDT"),
    number("ActualCases"),
    text("SKU_Resolved"),
    number("Std_CPH"),
    number("StdCasesThisHour"),
    number("RateAttain_100"),
    number("TargetRateAttain"),
    number("TargetAttain"),
];

const DOWNTIME_FIELDS: &[FieldSpec] = &[
    text("RowID"),
    date("Date"),
    text("Shift"),
    text("Line"),
    date("StartDT"),
    date("EndDT"),
    number("Minutes"),
    text("Machine"),
    text("OperatorEmpID"),
    text("Category"),
    text("Cause"),
    text("ActionTaken"),
    text("EscalatedYN"),
    text("ResolvedBy"),
    text("Notes"),
];

const STANDARDS_FIELDS: &[FieldSpec] = &[
    text("Line"),
    text("SKU"),
    text("ProductName"),
    number("Std_CPH"),
];

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Schedule,
        Category::Hourly,
        Category::Downtime,
        Category::Standards,
    ];

    /// Key used for this category in dataset documents.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Schedule => "schedule",
            Category::Hourly => "hourly",
            Category::Downtime => "downtime",
            Category::Standards => "standards",
        }
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Category::Schedule => SCHEDULE_FIELDS,
            Category::Hourly => HOURLY_FIELDS,
            Category::Downtime => DOWNTIME_FIELDS,
            Category::Standards => STANDARDS_FIELDS,
        }
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields().iter().map(|f| f.name).collect()
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }

    pub fn is_known_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Field holding the SKU for standards lookups.
    pub fn sku_field(&self) -> &'static str {
        match self {
            Category::Hourly => "SKU_Resolved",
            _ => "SKU",
        }
    }

    /// Fields joined (non-empty values only) to label a row in reports.
    pub fn location_fields(&self) -> &'static [&'static str] {
        match self {
            Category::Schedule => &["Line", "Date", "SKU"],
            Category::Hourly => &["Line", "HourEndingDT"],
            Category::Downtime => &["Line", "Machine", "StartDT"],
            Category::Standards => &["Line", "SKU"],
        }
    }

    /// Fields that identify duplicate-candidate rows.
    pub fn duplicate_key_fields(&self) -> &'static [&'static str] {
        match self {
            Category::Schedule => &[
                "Date",
                "Line",
                "SKU",
                "StartDT",
                "PlannedCases",
                "Cases_Planned",
                "Shifts_Planned",
            ],
            Category::Hourly => &["Line", "HourEndingDT"],
            Category::Downtime => &["Line", "Machine", "StartDT"],
            Category::Standards => &["Line", "SKU"],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Schedule => write!(f, "Schedule"),
            Category::Hourly => write!(f, "Hourly"),
            Category::Downtime => write!(f, "Downtime"),
            Category::Standards => write!(f, "Standards"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts dataset keys, display names and authoring table names.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "schedule" | "tblschedule" | "schedule_entry" => Ok(Category::Schedule),
            "hourly" | "tblhourly" | "hourly_log" => Ok(Category::Hourly),
            "downtime" | "tbldowntime" | "downtime_log" => Ok(Category::Downtime),
            "standards" | "tblstandards" => Ok(Category::Standards),
            _ => Err(format!("unknown category: '{}'", s)),
        }
    }
}

/// All rows of one analysis pass, per category, in source order.
///
/// Categories that were absent from the source are tracked separately from
/// categories that were present but empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: BTreeMap<Category, Vec<Row>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by callers that already hold typed rows.
    pub fn with_rows(mut self, category: Category, rows: Vec<Row>) -> Self {
        self.rows.insert(category, rows);
        self
    }

    pub fn rows(&self, category: Category) -> &[Row] {
        self.rows.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_present(&self, category: Category) -> bool {
        self.rows.contains_key(&category)
    }

    pub fn present_categories(&self) -> BTreeSet<Category> {
        self.rows.keys().copied().collect()
    }

    pub fn total_rows(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    /// Read a dataset document from disk.
    pub fn from_path(path: &Path) -> Result<Self, FlightDeckError> {
        let contents = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&contents)?;
        Ok(Self::from_json(&value)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, FlightDeckError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Ok(Self::from_json(&value)?)
    }

    /// Validate the document shape and type every cell against the field
    /// catalogue of its category.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, DatasetError> {
        let object = value.as_object().ok_or(DatasetError::NotAnObject)?;
        let mut dataset = Dataset::new();

        for (key, rows) in object {
            let category: Category = key
                .parse()
                .map_err(|_| DatasetError::UnknownCategory(key.clone()))?;
            if dataset.rows.contains_key(&category) {
                return Err(DatasetError::DuplicateCategory {
                    category,
                    key: key.clone(),
                });
            }
            let rows = rows.as_array().ok_or(DatasetError::NotAnArray(category))?;

            let mut typed = Vec::with_capacity(rows.len());
            for (index, raw) in rows.iter().enumerate() {
                typed.push(parse_row(category, index, raw)?);
            }
            dataset.rows.insert(category, typed);
        }

        tracing::debug!(
            categories = dataset.rows.len(),
            rows = dataset.total_rows(),
            "dataset loaded"
        );
        Ok(dataset)
    }
}

fn parse_row(
    category: Category,
    index: usize,
    raw: &serde_json::Value,
) -> Result<Row, DatasetError> {
    let cells = raw
        .as_object()
        .ok_or(DatasetError::RowNotObject { category, index })?;

    let mut row = Row::new();
    for (field, cell) in cells {
        let spec = category
            .field(field)
            .ok_or_else(|| DatasetError::UnknownField {
                category,
                index,
                field: field.clone(),
            })?;
        let value = match cell {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => {
                FieldValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string())
            }
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(n) => FieldValue::Number(n),
                None => FieldValue::Text(n.to_string()),
            },
            serde_json::Value::String(s) => match spec.kind {
                FieldKind::Date => parse_datetime(s)
                    .map(FieldValue::Date)
                    .unwrap_or_else(|| FieldValue::Text(s.clone())),
                FieldKind::Text | FieldKind::Number => FieldValue::Text(s.clone()),
            },
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                return Err(DatasetError::NonScalarCell {
                    category,
                    index,
                    field: field.clone(),
                })
            }
        };
        row.insert(field.clone(), value);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn types_cells_by_catalogue() {
        let ds = Dataset::from_json(&json!({
            "hourly": [
                {"Line": "Line 1", "HourEndingDT": "2025-08-08 07:00", "ActualCases": 92, "TargetAttain": "=(J2/K2)"}
            ]
        }))
        .unwrap();

        let row = &ds.rows(Category::Hourly)[0];
        assert!(matches!(row.value("HourEndingDT"), FieldValue::Date(_)));
        assert_eq!(row.value("ActualCases"), &FieldValue::Number(92.0));
        assert_eq!(row.value("TargetAttain").as_number(), None);
    }

    #[test]
    fn absent_and_empty_categories_differ() {
        let ds = Dataset::from_json(&json!({"schedule": []})).unwrap();
        assert!(ds.is_present(Category::Schedule));
        assert!(!ds.is_present(Category::Downtime));
        assert!(ds.rows(Category::Downtime).is_empty());
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert_eq!(
            Dataset::from_json(&json!([1, 2])),
            Err(DatasetError::NotAnObject)
        );
        assert_eq!(
            Dataset::from_json(&json!({"payroll": []})),
            Err(DatasetError::UnknownCategory("payroll".into()))
        );
        assert_eq!(
            Dataset::from_json(&json!({"standards": [{"Line": "Line 1", "Colour": "red"}]})),
            Err(DatasetError::UnknownField {
                category: Category::Standards,
                index: 0,
                field: "Colour".into(),
            })
        );
        assert!(matches!(
            Dataset::from_json(&json!({"downtime": [{"Line": ["a"]}]})),
            Err(DatasetError::NonScalarCell { .. })
        ));
    }

    #[test]
    fn json_rows_list_fields_by_name() {
        let ds = Dataset::from_json_str(
            r#"{"downtime": [{"Minutes": 5, "Line": "Line 1", "Cause": "Jam"}]}"#,
        )
        .unwrap();
        let names: Vec<&str> = ds.rows(Category::Downtime)[0]
            .fields
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(names, ["Cause", "Line", "Minutes"]);
    }

    #[test]
    fn category_aliases_cannot_both_appear() {
        assert_eq!(
            Dataset::from_json(&json!({
                "hourly": [{"Line": "Line 1", "ActualCases": 10}],
                "tblHourly": [{"Line": "Line 2", "ActualCases": 20}]
            })),
            Err(DatasetError::DuplicateCategory {
                category: Category::Hourly,
                key: "tblHourly".into(),
            })
        );
        assert!(Dataset::from_json(&json!({"tblHourly": [], "schedule": []})).is_ok());
    }

    #[test]
    fn category_parses_table_names() {
        assert_eq!("tblStandards".parse::<Category>(), Ok(Category::Standards));
        assert_eq!("Hourly".parse::<Category>(), Ok(Category::Hourly));
        assert!("Shift".parse::<Category>().is_err());
    }
}
