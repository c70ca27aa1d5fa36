use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tracegate_core::report::{artifacts, model::ToolInfo, render};
use tracegate_core::rules::config::{ConfigError, RuleSet};
use tracegate_core::trace::ingest::TraceSource;
use tracegate_core::{EXIT_FATAL, analyze};

mod args;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_rules(path: Option<&Path>) -> Result<RuleSet, ConfigError> {
    match path {
        Some(path) => RuleSet::from_toml_path(path),
        None => Ok(RuleSet::builtin()),
    }
}

/// Print a fatal error and exit with the input-error status.
fn fatal(err: impl std::fmt::Display) -> ! {
    eprintln!("error: {err}");
    std::process::exit(EXIT_FATAL);
}

fn run_analyze(args: args::AnalyzeArgs) -> Result<()> {
    let rules = load_rules(args.rules.as_deref()).unwrap_or_else(|e| fatal(e));

    let tool = ToolInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: args.commit.clone(),
    };

    let source = TraceSource::from_arg(&args.input);
    let report = analyze(&source, &rules, tool).unwrap_or_else(|e| fatal(e));

    let output = match args.format {
        args::OutputFormat::Json => serde_json::to_string_pretty(&report)? + "\n",
        args::OutputFormat::Text => render::render_text(&report),
    };

    if let Some(dir) = &args.out {
        artifacts::write_artifacts(&report, dir)
            .with_context(|| format!("failed to write artifacts to {}", dir.display()))?;
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;

    std::process::exit(report.exit_code());
}

fn run_rules(args: args::RulesArgs) -> Result<()> {
    let rules = load_rules(args.rules.as_deref()).unwrap_or_else(|e| fatal(e));
    println!("{}", serde_json::to_string_pretty(&rules)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = args::Args::parse();
    init_tracing(args.verbose);

    match args.command {
        args::Command::Analyze(a) => run_analyze(a),
        args::Command::Rules(r) => run_rules(r),
    }
}
