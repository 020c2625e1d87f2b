//! CLI tool for PDX schema inspection.
//!
//! Provides commands for:
//! - Merging a local schema with a remote one
//! - Registering schemas and printing their assigned type ids

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let output = match cli.command {
        Commands::Merge { local, remote } => commands::merge(&local, &remote)?,
        Commands::Register { schemas, config } => commands::register(&schemas, config.as_deref())?,
    };
    println!("{}", output);
    Ok(())
}
