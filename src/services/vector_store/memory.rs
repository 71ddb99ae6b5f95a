//! In-process vector index.
//!
//! Distance is squared Euclidean over unit vectors, converted with
//! `score = 1 - d2/2` — equal to cosine similarity for normalized inputs.
//! Reads run fully concurrent; upserts and deletes take the write lock,
//! which is coarse single-writer serialization and fine for an index where
//! ingestion is rare relative to queries.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{IndexStats, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{ChunkEntry, ScoredChunk};

pub struct MemoryVectorStore {
    dimension: usize,
    entries: RwLock<Vec<ChunkEntry>>,
}

impl MemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(Vec::new()),
        }
    }

    fn check_dimensions(&self, entries: &[ChunkEntry]) -> Result<(), VectorStoreError> {
        for entry in entries {
            if entry.vector.len() != self.dimension {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: self.dimension,
                    actual: entry.vector.len(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, entries: Vec<ChunkEntry>) -> Result<(), VectorStoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        self.check_dimensions(&entries)?;

        let mut store = self
            .entries
            .write()
            .map_err(|_| VectorStoreError::Upsert("index lock poisoned".to_string()))?;

        for entry in entries {
            if let Some(existing) = store.iter_mut().find(|e| e.id == entry.id) {
                *existing = entry;
            } else {
                store.push(entry);
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: u32,
        min_score: f32,
        dataset_filter: Option<&[String]>,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        // An explicitly empty filter matches nothing.
        if let Some(ids) = dataset_filter
            && ids.is_empty()
        {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }

        let store = self
            .entries
            .read()
            .map_err(|_| VectorStoreError::Search("index lock poisoned".to_string()))?;

        let mut hits: Vec<ScoredChunk> = store
            .iter()
            .filter(|entry| match dataset_filter {
                Some(ids) => ids.iter().any(|id| *id == entry.metadata.dataset_id),
                None => true,
            })
            .map(|entry| {
                let d2: f32 = query_vector
                    .iter()
                    .zip(entry.vector.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                let score = (1.0 - d2 / 2.0).clamp(0.0, 1.0);
                ScoredChunk {
                    id: entry.id.clone(),
                    text: entry.text.clone(),
                    score,
                    metadata: entry.metadata.clone(),
                }
            })
            .filter(|hit| hit.score >= min_score)
            .collect();

        // Stable sort keeps insertion order among equal scores.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k as usize);

        Ok(hits)
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Result<u64, VectorStoreError> {
        let mut store = self
            .entries
            .write()
            .map_err(|_| VectorStoreError::Delete("index lock poisoned".to_string()))?;

        let before = store.len();
        store.retain(|entry| entry.metadata.dataset_id != dataset_id);
        Ok((before - store.len()) as u64)
    }

    async fn count_by_dataset(&self, dataset_id: &str) -> Result<u64, VectorStoreError> {
        let store = self
            .entries
            .read()
            .map_err(|_| VectorStoreError::Search("index lock poisoned".to_string()))?;
        Ok(store
            .iter()
            .filter(|e| e.metadata.dataset_id == dataset_id)
            .count() as u64)
    }

    async fn stats(&self) -> Result<IndexStats, VectorStoreError> {
        let store = self
            .entries
            .read()
            .map_err(|_| VectorStoreError::Search("index lock poisoned".to_string()))?;

        let mut per_dataset: BTreeMap<String, u64> = BTreeMap::new();
        for entry in store.iter() {
            *per_dataset
                .entry(entry.metadata.dataset_id.clone())
                .or_insert(0) += 1;
        }

        Ok(IndexStats {
            total_vectors: store.len() as u64,
            per_dataset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn entry(dataset_id: &str, chunk_index: u32, vector: Vec<f32>) -> ChunkEntry {
        ChunkEntry::new(
            format!("text {chunk_index}"),
            vector,
            ChunkMetadata {
                dataset_id: dataset_id.to_string(),
                dataset_name: dataset_id.to_string(),
                source_title: "doc.txt".to_string(),
                chunk_index,
                char_count: 6,
                created_at: "2025-01-01T00:00:00Z".to_string(),
            },
        )
    }

    fn unit(x: f32, y: f32) -> Vec<f32> {
        let norm = (x * x + y * y).sqrt();
        vec![x / norm, y / norm]
    }

    #[tokio::test]
    async fn test_search_orders_by_score_descending() {
        let store = MemoryVectorStore::new(2);
        store
            .upsert(vec![
                entry("ds", 0, unit(1.0, 0.0)),
                entry("ds", 1, unit(0.0, 1.0)),
                entry("ds", 2, unit(1.0, 1.0)),
            ])
            .await
            .unwrap();

        let hits = store.search(&unit(1.0, 0.0), 10, 0.0, None).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].metadata.chunk_index, 0);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for hit in &hits {
            assert!((0.0..=1.0).contains(&hit.score));
        }
    }

    #[tokio::test]
    async fn test_min_score_filters_and_top_k_truncates() {
        let store = MemoryVectorStore::new(2);
        store
            .upsert(vec![
                entry("ds", 0, unit(1.0, 0.0)),
                entry("ds", 1, unit(1.0, 0.2)),
                entry("ds", 2, unit(0.0, 1.0)),
            ])
            .await
            .unwrap();

        let hits = store.search(&unit(1.0, 0.0), 10, 0.9, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        for hit in &hits {
            assert!(hit.score >= 0.9);
        }

        let hits = store.search(&unit(1.0, 0.0), 1, 0.0, None).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_filter_matches_nothing() {
        let store = MemoryVectorStore::new(2);
        store.upsert(vec![entry("ds", 0, unit(1.0, 0.0))]).await.unwrap();

        let hits = store
            .search(&unit(1.0, 0.0), 10, 0.0, Some(&[]))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_dataset_filter_restricts_results() {
        let store = MemoryVectorStore::new(2);
        store
            .upsert(vec![
                entry("a", 0, unit(1.0, 0.0)),
                entry("b", 0, unit(1.0, 0.1)),
            ])
            .await
            .unwrap();

        let filter = vec!["b".to_string()];
        let hits = store
            .search(&unit(1.0, 0.0), 10, 0.0, Some(&filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.dataset_id, "b");
    }

    #[tokio::test]
    async fn test_search_empty_index_is_not_an_error() {
        let store = MemoryVectorStore::new(2);
        let hits = store.search(&unit(1.0, 0.0), 5, 0.0, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let store = MemoryVectorStore::new(3);
        let result = store.upsert(vec![entry("ds", 0, unit(1.0, 0.0))]).await;
        assert!(matches!(
            result,
            Err(VectorStoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let store = MemoryVectorStore::new(2);
        store.upsert(vec![entry("ds", 0, unit(1.0, 0.0))]).await.unwrap();
        store.upsert(vec![entry("ds", 0, unit(0.0, 1.0))]).await.unwrap();

        assert_eq!(store.count_by_dataset("ds").await.unwrap(), 1);
        let hits = store.search(&unit(0.0, 1.0), 1, 0.0, None).await.unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_delete_dataset_idempotent() {
        let store = MemoryVectorStore::new(2);
        store
            .upsert(vec![
                entry("a", 0, unit(1.0, 0.0)),
                entry("a", 1, unit(0.0, 1.0)),
                entry("b", 0, unit(1.0, 1.0)),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_dataset("a").await.unwrap(), 2);
        assert_eq!(store.count_by_dataset("a").await.unwrap(), 0);
        assert_eq!(store.count_by_dataset("b").await.unwrap(), 1);

        // Second delete: same end state, no error.
        assert_eq!(store.delete_dataset("a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disable_reenable_equivalence_via_filter() {
        // Disabling a dataset is expressed as omitting it from the filter;
        // the stored vectors are untouched, so re-enabling restores
        // identical results.
        let store = MemoryVectorStore::new(2);
        store
            .upsert(vec![
                entry("a", 0, unit(1.0, 0.0)),
                entry("b", 0, unit(1.0, 0.1)),
            ])
            .await
            .unwrap();

        let all = vec!["a".to_string(), "b".to_string()];
        let before = store.search(&unit(1.0, 0.0), 10, 0.0, Some(&all)).await.unwrap();

        let only_b = vec!["b".to_string()];
        let disabled = store
            .search(&unit(1.0, 0.0), 10, 0.0, Some(&only_b))
            .await
            .unwrap();
        assert!(disabled.iter().all(|h| h.metadata.dataset_id == "b"));

        let after = store.search(&unit(1.0, 0.0), 10, 0.0, Some(&all)).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_stats() {
        let store = MemoryVectorStore::new(2);
        store
            .upsert(vec![
                entry("a", 0, unit(1.0, 0.0)),
                entry("a", 1, unit(0.0, 1.0)),
                entry("b", 0, unit(1.0, 1.0)),
            ])
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_vectors, 3);
        assert_eq!(stats.per_dataset.get("a"), Some(&2));
        assert_eq!(stats.per_dataset.get("b"), Some(&1));
    }
}
