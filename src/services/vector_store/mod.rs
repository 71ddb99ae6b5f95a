//! Vector index abstraction layer.
//!
//! Two backends share one trait: an in-process index requiring no external
//! service, and a remote Qdrant collection. `create_backend` picks one from
//! configuration.

mod memory;
mod qdrant;

pub use memory::MemoryVectorStore;
pub use qdrant::QdrantVectorStore;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{ChunkEntry, ScoredChunk, VectorDriver, VectorStoreConfig};

/// Index-wide statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IndexStats {
    pub total_vectors: u64,
    /// Vector count per dataset id, sorted by id
    pub per_dataset: BTreeMap<String, u64>,
}

/// Vector index contract.
///
/// Scores are cosine-equivalent similarities in `[0, 1]`. Search results
/// come back in descending score order, ties broken by insertion order,
/// truncated to `top_k`, with every score at or above `min_score`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store one entry per chunk. Replaces entries with the same id.
    /// Fails with `DimensionMismatch` if a vector's length disagrees with
    /// the index's established dimensionality.
    async fn upsert(&self, entries: Vec<ChunkEntry>) -> Result<(), VectorStoreError>;

    /// Nearest-neighbor search over datasets in `dataset_filter` (None =
    /// no restriction; an empty slice matches nothing). An index with zero
    /// eligible vectors returns an empty list, not an error.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: u32,
        min_score: f32,
        dataset_filter: Option<&[String]>,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    /// Remove all entries for a dataset; returns the number removed.
    /// Idempotent: deleting an absent dataset is a no-op, not an error.
    async fn delete_dataset(&self, dataset_id: &str) -> Result<u64, VectorStoreError>;

    async fn count_by_dataset(&self, dataset_id: &str) -> Result<u64, VectorStoreError>;

    async fn stats(&self) -> Result<IndexStats, VectorStoreError>;
}

/// Construct the configured backend. `dimension` becomes the index's
/// established dimensionality.
pub async fn create_backend(
    config: &VectorStoreConfig,
    dimension: u32,
) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        VectorDriver::Memory => Ok(Arc::new(MemoryVectorStore::new(dimension as usize))),
        VectorDriver::Qdrant => {
            let backend = QdrantVectorStore::new(config, u64::from(dimension))?;
            backend.ensure_collection().await?;
            Ok(Arc::new(backend))
        }
    }
}
