//! `strata graph`: Render the unit dependency graph.

use std::path::PathBuf;

use clap::Args;

/// Arguments for the `graph` subcommand.
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Path to the stack manifest (YAML or JSON).
    #[arg(default_value = strata_common::constants::DEFAULT_MANIFEST)]
    pub file: PathBuf,
}

/// Executes the `graph` command, printing Graphviz DOT to stdout.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded or a requirement
/// is unsatisfied.
pub fn execute(args: &GraphArgs) -> anyhow::Result<()> {
    let dot = super::load(&args.file)?.to_dot()?;
    print!("{dot}");
    Ok(())
}
