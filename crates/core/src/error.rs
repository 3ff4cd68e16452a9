use thiserror::Error;

use crate::dataset::Category;

#[derive(Error, Debug)]
pub enum FlightDeckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unreadable dataset: {0}")]
    Dataset(#[from] DatasetError),

    #[error("{0}")]
    Other(String),
}

/// Structural problems that make a dataset impossible to analyze.
///
/// These are the only fatal conditions of an analysis run: a dataset whose
/// shape is unknown is rejected once instead of producing an empty report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    #[error("dataset must be a JSON object keyed by category")]
    NotAnObject,

    #[error("unknown dataset category '{0}'")]
    UnknownCategory(String),

    #[error("dataset key '{key}' names {category} a second time")]
    DuplicateCategory { category: Category, key: String },

    #[error("category '{0}' must be an array of rows")]
    NotAnArray(Category),

    #[error("{category} row {index} is not an object")]
    RowNotObject { category: Category, index: usize },

    #[error("{category} row {index} has unknown field '{field}'")]
    UnknownField {
        category: Category,
        index: usize,
        field: String,
    },

    #[error("{category} row {index} field '{field}' holds a nested value")]
    NonScalarCell {
        category: Category,
        index: usize,
        field: String,
    },
}
