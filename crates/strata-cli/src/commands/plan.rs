//! `strata plan`: Display the instantiation plan before synthesis.

use std::path::PathBuf;

use clap::Args;

use crate::output::{heading, plural, summarize_attributes};

/// Attributes shown next to each handle, when present.
const PLAN_ATTRIBUTES: [&str; 5] = ["cidr", "placement", "capacity", "port", "origin_id"];

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Path to the stack manifest (YAML or JSON).
    #[arg(default_value = strata_common::constants::DEFAULT_MANIFEST)]
    pub file: PathBuf,
}

/// Executes the `plan` command.
///
/// Loads the manifest, resolves the unit order, instantiates every
/// template, and lists the handles each unit produces in order.
///
/// # Errors
///
/// Returns an error if loading, resolution, or any template fails.
pub fn execute(args: &PlanArgs) -> anyhow::Result<()> {
    let resolver = super::load(&args.file)?;
    let composition = resolver.composition();
    let result = resolver.instantiate()?;

    println!("{}", heading(&format!("Stack plan for: {}", args.file.display())));
    println!("  project: {}", composition.project().prefix());
    println!();

    for name in &result.order {
        let kind = composition.unit(name).map_or("?", |u| u.kind());
        println!("  + {name} ({kind})");
        for (key, handle) in result.registry.owned_by(name) {
            let extra = summarize_attributes(handle.attributes(), &PLAN_ATTRIBUTES);
            println!("      {:<18} {key}  {}{extra}", handle.kind().to_string(), handle.id());
        }
    }

    println!();
    println!(
        "  {} will produce {}.",
        plural(result.order.len(), "unit"),
        plural(result.registry.len(), "handle")
    );

    if !result.attachments.is_empty() {
        println!();
        println!("  Attachments:");
        for attachment in &result.attachments {
            println!("    {} -> {}", attachment.source, attachment.target);
        }
    }

    Ok(())
}
