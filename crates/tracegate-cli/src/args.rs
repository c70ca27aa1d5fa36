use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "tracegate",
    version,
    about = "Deterministic gate for irreversible actions in agent traces"
)]
pub struct Args {
    /// Log engine diagnostics at debug level (stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze a line-delimited JSON trace
    Analyze(AnalyzeArgs),

    /// Print the effective rule tables as JSON
    Rules(RulesArgs),
}

#[derive(Debug, ClapArgs)]
pub struct AnalyzeArgs {
    /// Path to the .jsonl trace, or `-` for standard input
    pub input: String,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Also write findings.json, coverage.json and report.txt into this directory
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// TOML file extending or replacing the built-in rule tables
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Optional git commit hash for tool metadata
    #[arg(long)]
    pub commit: Option<String>,
}

#[derive(Debug, ClapArgs)]
pub struct RulesArgs {
    /// TOML file extending or replacing the built-in rule tables
    #[arg(long)]
    pub rules: Option<PathBuf>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
