use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Shift flight deck: evaluate plant-floor rules against a shift dataset.
///
/// Paths and report settings fall back to the environment
/// (`RULES_PATH`, `DATASET_PATH`, `REPORT_TOP_ACTIONS`, ...) when a flag is
/// not given.
#[derive(Parser, Debug)]
#[command(name = "flightdeck", version, about)]
pub struct CliArgs {
    /// Configuration profile (overrides FLIGHTDECK_PROFILE)
    #[arg(long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every enabled rule against a dataset and print the report
    Analyze {
        /// Rule snapshot (.json, .yml or .yaml)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Dataset document (JSON keyed by category)
        #[arg(long)]
        dataset: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Number of ranked actions in the Recommended Actions section
        #[arg(long)]
        top: Option<usize>,

        /// Evaluate rules on a thread pool
        #[arg(long)]
        parallel: bool,
    },

    /// Lint a rule snapshot; exits with status 1 when issues are found
    Lint {
        #[arg(long)]
        rules: Option<PathBuf>,
    },

    /// Write the valid rules to a new snapshot (format chosen by extension)
    ExportRules {
        #[arg(long)]
        rules: Option<PathBuf>,

        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
