//! Rule registry: loads rule records from the authoring table or a snapshot
//! file, lints them once, and hands the compiled set to the analyzer.
//!
//! An unreadable snapshot is not fatal; the registry degrades to
//! [`RuleSource::None`] and the run evaluates no rules.

mod core;
mod error;


pub use self::core::{RuleRegistry, RuleSource};
pub use self::error::{Result, RuleError};
