//! `strata validate`: Check a manifest without producing output.

use std::path::PathBuf;

use clap::Args;

use crate::output::plural;

/// Arguments for the `validate` command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the stack manifest (YAML or JSON).
    #[arg(default_value = strata_common::constants::DEFAULT_MANIFEST)]
    pub file: PathBuf,
}

/// Executes the `validate` command.
///
/// Runs the dry-run requirement checks, resolves the unit order, and
/// instantiates every template so configuration errors surface too.
///
/// # Errors
///
/// Returns an error if loading, resolution, or any template fails.
pub fn execute(args: &ValidateArgs) -> anyhow::Result<()> {
    let resolver = super::load(&args.file)?;
    let result = resolver.instantiate()?;

    println!(
        "{} is valid: {}, {}, {}",
        args.file.display(),
        plural(result.order.len(), "unit"),
        plural(result.registry.len(), "handle"),
        plural(result.attachments.len(), "attachment"),
    );
    Ok(())
}
