//! Rule severity: the ordinal priority used for ranking.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a rule. Declaration order is priority order (`Info < Urgent`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Urgent,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Info, Severity::Warning, Severity::Urgent];

    pub const NAMES: &'static [&'static str] = &["Info", "Warning", "Urgent"];

    /// Numeric rank for comparison (higher = more severe).
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Info => 1,
            Severity::Warning => 2,
            Severity::Urgent => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "Info"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Urgent => write!(f, "Urgent"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    /// Exact, case-sensitive match against the authoring vocabulary.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Info" => Ok(Severity::Info),
            "Warning" => Ok(Severity::Warning),
            "Urgent" => Ok(Severity::Urgent),
            other => Err(format!("unknown severity: '{}'", other)),
        }
    }
}
