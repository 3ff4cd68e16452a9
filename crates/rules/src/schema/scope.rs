//! Rule scope: which rows (or the dataset as a whole) a rule runs against.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use flightdeck_core::Category;

use crate::analysis::STAT_FIELDS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    Schedule,
    Hourly,
    Downtime,
    Standards,
    /// Evaluated once against the dataset statistics.
    Dataset,
}

impl Scope {
    pub const NAMES: &'static [&'static str] =
        &["Schedule", "Hourly", "Downtime", "Standards", "Dataset"];

    /// Row category for row-scoped rules; `None` for dataset-wide rules.
    pub fn category(&self) -> Option<Category> {
        match self {
            Scope::Schedule => Some(Category::Schedule),
            Scope::Hourly => Some(Category::Hourly),
            Scope::Downtime => Some(Category::Downtime),
            Scope::Standards => Some(Category::Standards),
            Scope::Dataset => None,
        }
    }

    /// Field names a condition in this scope may reference.
    pub fn legal_fields(&self) -> Vec<&'static str> {
        match self.category() {
            Some(category) => category.field_names(),
            None => STAT_FIELDS.to_vec(),
        }
    }

    pub fn is_legal_field(&self, name: &str) -> bool {
        match self.category() {
            Some(category) => category.is_known_field(name),
            None => STAT_FIELDS.contains(&name),
        }
    }
}

impl From<Category> for Scope {
    fn from(category: Category) -> Self {
        match category {
            Category::Schedule => Scope::Schedule,
            Category::Hourly => Scope::Hourly,
            Category::Downtime => Scope::Downtime,
            Category::Standards => Scope::Standards,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Schedule => write!(f, "Schedule"),
            Scope::Hourly => write!(f, "Hourly"),
            Scope::Downtime => write!(f, "Downtime"),
            Scope::Standards => write!(f, "Standards"),
            Scope::Dataset => write!(f, "Dataset"),
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Schedule" => Ok(Scope::Schedule),
            "Hourly" => Ok(Scope::Hourly),
            "Downtime" => Ok(Scope::Downtime),
            "Standards" => Ok(Scope::Standards),
            "Dataset" => Ok(Scope::Dataset),
            other => Err(format!("unknown scope: '{}'", other)),
        }
    }
}
