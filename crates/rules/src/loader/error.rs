//! Error types for the rule registry.

use std::path::PathBuf;

/// Errors that can occur while reading or writing a rule snapshot.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Snapshot path with an extension other than `.json`, `.yml` or `.yaml`.
    #[error("unsupported snapshot format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// Result alias for registry operations.
pub type Result<T> = std::result::Result<T, RuleError>;
