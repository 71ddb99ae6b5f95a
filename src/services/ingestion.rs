//! Document ingestion: read, chunk, embed, index, register.

use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::IngestError;
use crate::models::{Chunk, ChunkEntry, ChunkMetadata, ChunkingStrategy, Dataset};
use crate::services::chunker::TextChunker;
use crate::services::embedding::EmbeddingProvider;
use crate::services::registry::DatasetRegistry;
use crate::services::vector_store::VectorStore;
use crate::utils::{calculate_checksum, is_text_file, read_file_content};

const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub strategy: ChunkingStrategy,
    pub show_progress: bool,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub dataset_id: String,
    pub dataset_name: String,
    pub num_chunks: u32,
    pub file_size: u64,
    pub checksum: String,
}

pub struct IngestionService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    registry: Arc<DatasetRegistry>,
    batch_size: usize,
}

impl IngestionService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        registry: Arc<DatasetRegistry>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            registry,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest a single text file as a new dataset.
    pub async fn ingest_file(
        &self,
        path: &Path,
        dataset_name: &str,
        options: &IngestOptions,
    ) -> Result<IngestReport, IngestError> {
        if !is_text_file(path) {
            return Err(IngestError::UnsupportedFile(path.display().to_string()));
        }

        let content = read_file_content(path, MAX_FILE_SIZE)
            .map_err(|e| IngestError::FileRead(format!("{}: {}", path.display(), e)))?;
        let file_size = content.chars().count() as u64;
        let checksum = calculate_checksum(&content);

        info!(path = %path.display(), chars = file_size, "starting ingestion");

        let chunker = TextChunker::new(options.chunk_size, options.chunk_overlap, options.strategy)?;
        let chunks = chunker.chunk(&content);

        let mut dataset = Dataset::new(
            dataset_name,
            options.chunk_size,
            options.chunk_overlap,
            options.strategy,
        );
        dataset.file_size = file_size;

        if chunks.is_empty() {
            warn!(path = %path.display(), "no chunks produced");
            self.registry.create(&dataset)?;
            return Ok(IngestReport {
                dataset_id: dataset.id,
                dataset_name: dataset.name,
                num_chunks: 0,
                file_size,
                checksum,
            });
        }

        let source_title = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let entries = self
            .embed_chunks(&chunks, &dataset, &source_title, options.show_progress)
            .await?;
        let num_chunks = entries.len() as u32;

        self.store.upsert(entries).await?;

        dataset.num_chunks = num_chunks;
        self.registry.create(&dataset)?;

        info!(dataset = %dataset.name, num_chunks, "ingestion complete");

        Ok(IngestReport {
            dataset_id: dataset.id,
            dataset_name: dataset.name,
            num_chunks,
            file_size,
            checksum,
        })
    }

    async fn embed_chunks(
        &self,
        chunks: &[Chunk],
        dataset: &Dataset,
        source_title: &str,
        show_progress: bool,
    ) -> Result<Vec<ChunkEntry>, IngestError> {
        let pb = if show_progress {
            let pb = ProgressBar::new(chunks.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                    )
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let created_at = chrono::Utc::now().to_rfc3339();
        let mut entries = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_documents(&texts).await?;

            for (chunk, vector) in batch.iter().zip(vectors) {
                let metadata = ChunkMetadata {
                    dataset_id: dataset.id.clone(),
                    dataset_name: dataset.name.clone(),
                    source_title: source_title.to_string(),
                    chunk_index: chunk.chunk_index,
                    char_count: chunk.char_count,
                    created_at: created_at.clone(),
                };
                entries.push(ChunkEntry::new(chunk.text.clone(), vector, metadata));
            }

            if let Some(ref pb) = pb {
                pb.inc(batch.len() as u64);
            }
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        Ok(entries)
    }

    /// Remove a dataset from both the index and the registry.
    pub async fn delete_dataset(&self, dataset_id: &str) -> Result<u64, IngestError> {
        let removed = self.store.delete_dataset(dataset_id).await?;
        self.registry.delete(dataset_id)?;
        Ok(removed)
    }
}
