//! Rule records as authored, before validation.
//!
//! The authoring table and snapshot files are loosely typed: any cell may be
//! blank, a number, a boolean or text. Records keep every field as text so
//! that the linter, not deserialization, decides what is wrong with a rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use flightdeck_core::{FieldValue, Row};

/// One authored rule row. Field names follow the authoring table columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleRecord {
    #[serde(rename = "RuleID", default, deserialize_with = "de_cell")]
    pub rule_id: String,
    #[serde(rename = "Enabled", default, deserialize_with = "de_cell")]
    pub enabled: String,
    #[serde(rename = "Severity", default, deserialize_with = "de_cell")]
    pub severity: String,
    #[serde(rename = "Scope", default, deserialize_with = "de_cell")]
    pub scope: String,
    #[serde(
        rename = "Description",
        default,
        deserialize_with = "de_cell",
        skip_serializing_if = "String::is_empty"
    )]
    pub description: String,
    #[serde(rename = "IfLogic", alias = "Condition", default, deserialize_with = "de_cell")]
    pub condition: String,
    #[serde(
        rename = "ThenRecommendation",
        alias = "Message",
        default,
        deserialize_with = "de_cell"
    )]
    pub message: String,
    #[serde(
        rename = "ThenEscalation",
        default,
        deserialize_with = "de_cell",
        skip_serializing_if = "String::is_empty"
    )]
    pub escalation: String,
    #[serde(
        rename = "RequiredFields",
        default,
        deserialize_with = "de_field_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub required_fields: Vec<String>,
    #[serde(
        rename = "AppliesToLine",
        default,
        deserialize_with = "de_cell",
        skip_serializing_if = "String::is_empty"
    )]
    pub applies_to_line: String,
    #[serde(
        rename = "AppliesToMachine",
        default,
        deserialize_with = "de_cell",
        skip_serializing_if = "String::is_empty"
    )]
    pub applies_to_machine: String,
    #[serde(
        rename = "AppliesToSKU",
        default,
        deserialize_with = "de_cell",
        skip_serializing_if = "String::is_empty"
    )]
    pub applies_to_sku: String,
    /// Position in the authoring source. Snapshots carry it so that a
    /// reloaded rule set ranks ties exactly as the source did, including
    /// positions held by rules that failed lint and were not exported.
    #[serde(rename = "Position", default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

/// Serialized rule set, as written by `export-rules` and read back by the registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rules: Vec<RuleRecord>,
}

impl RuleRecord {
    /// Map one row of the live authoring table onto a record.
    ///
    /// Returns `None` for rows where every cell is blank, which spreadsheet
    /// tables routinely carry below the last authored rule.
    pub fn from_table_row(row: &Row) -> Option<Self> {
        if row.fields.values().all(FieldValue::is_missing) {
            return None;
        }

        let cell = |names: &[&str]| -> String {
            names
                .iter()
                .find_map(|name| row.get(name).filter(|v| !v.is_missing()))
                .map(cell_text)
                .unwrap_or_default()
        };

        Some(Self {
            rule_id: cell(&["RuleID"]),
            enabled: cell(&["Enabled"]),
            severity: cell(&["Severity"]),
            scope: cell(&["Scope"]),
            description: cell(&["Description"]),
            condition: cell(&["IfLogic", "Condition"]),
            message: cell(&["ThenRecommendation", "Message"]),
            escalation: cell(&["ThenEscalation"]),
            required_fields: split_field_list(&cell(&["RequiredFields"])),
            applies_to_line: cell(&["AppliesToLine"]),
            applies_to_machine: cell(&["AppliesToMachine"]),
            applies_to_sku: cell(&["AppliesToSKU"]),
            position: None,
        })
    }
}

fn cell_text(value: &FieldValue) -> String {
    value.to_string().trim().to_string()
}

fn split_field_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Cell {
    Flag(bool),
    Number(f64),
    Text(String),
}

fn de_cell<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let cell = Option::<Cell>::deserialize(deserializer)?;
    Ok(match cell {
        None => String::new(),
        Some(Cell::Flag(true)) => "TRUE".to_string(),
        Some(Cell::Flag(false)) => "FALSE".to_string(),
        Some(Cell::Number(n)) => FieldValue::Number(n).to_string(),
        Some(Cell::Text(s)) => s.trim().to_string(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldList {
    List(Vec<String>),
    Text(String),
}

fn de_field_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<FieldList>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(FieldList::List(list)) => list
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(FieldList::Text(text)) => split_field_list(&text),
    })
}
