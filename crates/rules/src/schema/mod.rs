//! Rule schema types.
//!
//! - `RuleRecord` / `RuleSnapshot`: loosely typed rules as authored or exported
//! - `Severity` / `Scope`: the closed vocabularies a record must use
//! - `Rule` / `CompiledRule`: validated rules ready for evaluation

mod record;
mod rule;
mod scope;
mod severity;

pub use record::*;
pub use rule::*;
pub use scope::*;
pub use severity::*;
