//! CLI command definitions and dispatch.

pub mod graph;
pub mod plan;
pub mod synth;
pub mod validate;

use std::path::Path;

use clap::{Parser, Subcommand, ValueEnum};
use strata_sdk::graph_resolver::StackResolver;

/// strata: compose infrastructure stacks from dependency-ordered units.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Log output format.
    #[arg(long, global = true, env = "STRATA_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a manifest: requirements, attachments, and cycles.
    Validate(validate::ValidateArgs),
    /// Display the instantiation plan and every produced handle.
    Plan(plan::PlanArgs),
    /// Emit the synthesized stack document as JSON.
    Synth(synth::SynthArgs),
    /// Render the unit dependency graph in Graphviz DOT format.
    Graph(graph::GraphArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Validate(args) => validate::execute(&args),
        Command::Plan(args) => plan::execute(&args),
        Command::Synth(args) => synth::execute(&args),
        Command::Graph(args) => graph::execute(&args),
    }
}

/// Loads a manifest into a resolver, attaching the path to any error.
fn load(file: &Path) -> anyhow::Result<StackResolver> {
    if !file.exists() {
        anyhow::bail!("manifest not found: {}", file.display());
    }
    Ok(StackResolver::load(file)?)
}
