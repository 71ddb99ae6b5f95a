use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::output::{OutputFormat, get_formatter};
use crate::models::{ChunkingStrategy, Config, VectorDriver};
use crate::services::ingestion::{IngestOptions, IngestionService};

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[arg(required = true, help = "Path to the text file to ingest")]
    pub path: PathBuf,

    #[arg(long, short = 'n', help = "Dataset name (defaults to the file stem)")]
    pub name: Option<String>,

    #[arg(long, help = "Maximum characters per chunk")]
    pub chunk_size: Option<u32>,

    #[arg(long, help = "Overlapping characters between consecutive chunks")]
    pub chunk_overlap: Option<u32>,

    #[arg(long, short = 's', help = "Chunking strategy: characters or sentences")]
    pub strategy: Option<ChunkingStrategy>,
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let name = match args.name {
        Some(name) => name,
        None => args
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .context("could not derive a dataset name from the path")?,
    };

    let registry = super::open_registry()?;
    if registry.find_by_name(&name)?.is_some() {
        anyhow::bail!("dataset '{name}' already exists; delete or rename it first");
    }

    if verbose && config.vector_store.driver == VectorDriver::Memory {
        eprintln!("Note: the in-memory index does not persist across runs.");
    }

    let embedder = super::load_embedder(&config)?;
    let store = super::connect_store(&config).await?;

    let options = IngestOptions {
        chunk_size: args.chunk_size.unwrap_or(config.chunking.chunk_size),
        chunk_overlap: args.chunk_overlap.unwrap_or(config.chunking.chunk_overlap),
        strategy: args.strategy.unwrap_or(config.chunking.strategy),
        show_progress: format == OutputFormat::Text,
    };

    let service = IngestionService::new(
        embedder,
        store,
        registry,
        config.embedding.batch_size as usize,
    );

    let report = service
        .ingest_file(&args.path, &name, &options)
        .await
        .context("ingestion failed")?;

    print!("{}", formatter.format_ingest_report(&report));
    Ok(())
}
