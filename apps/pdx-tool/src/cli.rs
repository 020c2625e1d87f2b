use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge a local schema with a remote schema of the same class
    Merge {
        /// JSON file holding the locally compiled schema
        #[arg(short, long)]
        local: PathBuf,

        /// JSON file holding the schema received from a server
        #[arg(short, long)]
        remote: PathBuf,
    },

    /// Register a list of schemas and print the assigned type ids
    Register {
        /// JSON file holding an array of schemas
        schemas: PathBuf,

        /// Registry configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
