mod cli;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use flightdeck_core::{Config, Dataset};
use flightdeck_rules::{Analyzer, Report, RuleRegistry};

use crate::cli::{CliArgs, Command, OutputFormat};

fn main() -> Result<ExitCode> {
    flightdeck_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let config = match args.profile.as_deref() {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    config.log_summary();

    match args.command {
        Command::Analyze {
            rules,
            dataset,
            format,
            top,
            parallel,
        } => {
            let rules = rules.unwrap_or_else(|| config.rules.rules_path.clone());
            let dataset = dataset.unwrap_or_else(|| config.analysis.dataset_path.clone());
            let top = top.unwrap_or(config.analysis.top_actions);
            let analyzer = Analyzer::from_config(&config.analysis)
                .with_parallelism(parallel || config.analysis.parallel, config.analysis.threads);
            analyze(&analyzer, &rules, &dataset, format, top)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Lint { rules } => {
            let rules = rules.unwrap_or_else(|| config.rules.rules_path.clone());
            lint(&rules)
        }
        Command::ExportRules { rules, out } => {
            let rules = rules.unwrap_or_else(|| config.rules.rules_path.clone());
            export_rules(&rules, &out)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ── Commands ─────────────────────────────────────────────────

fn analyze(
    analyzer: &Analyzer,
    rules_path: &Path,
    dataset_path: &Path,
    format: OutputFormat,
    top: usize,
) -> Result<()> {
    // A missing snapshot still yields a report; a broken dataset does not.
    let registry = RuleRegistry::load_or_empty(rules_path);
    let dataset = Dataset::from_path(dataset_path)
        .with_context(|| format!("failed to load dataset {}", dataset_path.display()))?;

    let result = analyzer.analyze(&registry, &dataset);
    info!(
        findings = result.findings.len(),
        diagnostics = result.diagnostics.len(),
        "analysis complete"
    );

    let report = Report::build(&registry, &result, chrono::Utc::now(), top);
    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
            println!("{json}");
        }
    }
    Ok(())
}

fn lint(rules_path: &Path) -> Result<ExitCode> {
    let registry = RuleRegistry::load_snapshot(rules_path)
        .with_context(|| format!("failed to read rules {}", rules_path.display()))?;

    let issues = registry.lint_issues();
    if issues.is_empty() {
        println!("{} rules, no linter issues", registry.rules().len());
        return Ok(ExitCode::SUCCESS);
    }

    for issue in issues {
        println!("{issue}");
    }
    warn!(issues = issues.len(), "rule lint failed");
    Ok(ExitCode::from(1))
}

fn export_rules(rules_path: &Path, out: &Path) -> Result<()> {
    let registry = RuleRegistry::load_snapshot(rules_path)
        .with_context(|| format!("failed to read rules {}", rules_path.display()))?;
    let written = registry
        .write_snapshot(out, chrono::Utc::now())
        .with_context(|| format!("failed to write snapshot {}", out.display()))?;
    println!("exported {written} rules to {}", out.display());
    Ok(())
}
