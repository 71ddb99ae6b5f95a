mod config;
mod dataset;
mod ingest;
mod query;
mod status;

pub use config::ConfigCommand;
pub use dataset::DatasetCommand;
pub use ingest::IngestArgs;
pub use query::QueryArgs;

pub use config::handle_config;
pub use dataset::handle_dataset;
pub use ingest::handle_ingest;
pub use query::handle_query;
pub use status::handle_status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::models::Config;
use crate::services::registry::DatasetRegistry;
use crate::services::vector_store::{VectorStore, create_backend};
use crate::services::{LocalEmbedder, QueryLog};

fn data_dir() -> Result<PathBuf> {
    Config::data_dir().context("could not determine data directory")
}

fn open_registry() -> Result<Arc<DatasetRegistry>> {
    let path = data_dir()?.join("datasets.db");
    Ok(Arc::new(
        DatasetRegistry::open(&path).context("failed to open dataset registry")?,
    ))
}

fn open_query_log() -> Result<QueryLog> {
    let path = data_dir()?.join("metrics.db");
    QueryLog::open(&path).context("failed to open query log")
}

fn load_embedder(config: &Config) -> Result<Arc<LocalEmbedder>> {
    Ok(Arc::new(
        LocalEmbedder::load(&config.embedding).context("failed to load embedding model")?,
    ))
}

async fn connect_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    create_backend(&config.vector_store, config.embedding.dimension)
        .await
        .context("failed to connect to vector store")
}
