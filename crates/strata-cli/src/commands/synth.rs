//! `strata synth`: Emit the synthesized stack document.

use std::path::PathBuf;

use clap::Args;

/// Arguments for the `synth` subcommand.
#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Path to the stack manifest (YAML or JSON).
    #[arg(default_value = strata_common::constants::DEFAULT_MANIFEST)]
    pub file: PathBuf,

    /// Write output to a file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Executes the `synth` command.
///
/// # Errors
///
/// Returns an error if the stack cannot be synthesized or the output
/// cannot be written.
pub fn execute(args: &SynthArgs) -> anyhow::Result<()> {
    let synthesis = super::load(&args.file)?.synthesize()?;
    let json = synthesis.to_json()?;

    if let Some(ref out_path) = args.output {
        std::fs::write(out_path, format!("{json}\n"))?;
        tracing::info!(path = %out_path.display(), "wrote synthesis");
        println!("Synthesized {} -> {}", args.file.display(), out_path.display());
        println!("Resources: {}", synthesis.resources.len());
        println!("Fingerprint: {}", synthesis.fingerprint);
    } else {
        println!("{json}");
    }

    Ok(())
}
