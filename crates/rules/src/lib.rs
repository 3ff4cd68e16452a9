//! Shift flight deck rule engine.
//!
//! This crate provides:
//! - A small condition language compiled once per run (`dsl`)
//! - A tri-state evaluator with row cross-references (`evaluator`)
//! - Rule records from the authoring table or JSON/YAML snapshots (`loader`)
//! - A linter with "did you mean" suggestions (`validation`)
//! - The analysis pass, ranking and report sections (`analysis`, `ranking`, `report`)

pub mod analysis;
pub mod dsl;
pub mod evaluator;
pub mod loader;
pub mod ranking;
pub mod report;
pub mod schema;
pub mod validation;

pub use analysis::{AnalysisResult, Analyzer, Finding};
pub use loader::{RuleRegistry, RuleSource};
pub use report::Report;
