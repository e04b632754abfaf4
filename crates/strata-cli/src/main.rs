//! # strata: infrastructure stack composer
//!
//! Validates stack manifests, prints instantiation plans, renders the
//! unit graph, and synthesizes documents for the provisioning engine.

mod commands;
mod output;

use clap::Parser;

use crate::commands::{Cli, LogFormat};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `synth` can stream JSON on stdout.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    commands::execute(cli)
}
