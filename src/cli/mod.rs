//! Command-line interface.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::cli::output::OutputFormat;

/// Retrieval-augmented question answering over local documents.
#[derive(Debug, Parser)]
#[command(name = "raglab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ask a question over the ingested datasets
    Query(commands::QueryArgs),

    /// Ingest a text file as a new dataset
    Ingest(commands::IngestArgs),

    /// Manage datasets (list, enable, disable, rename, delete)
    #[command(subcommand)]
    Dataset(commands::DatasetCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),

    /// Check component status and query metrics
    Status,
}
