//! Qdrant vector index backend.
//!
//! The collection is created with cosine distance, so scores come back as
//! cosine similarity directly and need no conversion — only a clamp into
//! `[0, 1]` to honor the score contract.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PayloadIncludeSelector, PointStruct, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use uuid::Uuid;

use super::{IndexStats, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{ChunkEntry, ChunkMetadata, ScoredChunk, VectorStoreConfig};

pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimension: u64,
}

impl QdrantVectorStore {
    pub fn new(config: &VectorStoreConfig, dimension: u64) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension,
        })
    }

    pub async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        let exists = match self.client.collection_info(&self.collection).await {
            Ok(_) => true,
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    false
                } else {
                    return Err(VectorStoreError::Collection(msg));
                }
            }
        };

        if exists {
            return Ok(());
        }

        let create = CreateCollectionBuilder::new(&self.collection)
            .vectors_config(VectorParamsBuilder::new(self.dimension, Distance::Cosine));

        self.client
            .create_collection(create)
            .await
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;

        Ok(())
    }

    fn dataset_filter(dataset_ids: &[String]) -> Filter {
        let conditions: Vec<Condition> = dataset_ids
            .iter()
            .map(|id| Condition::matches("dataset_id", id.clone()))
            .collect();
        Filter::should(conditions)
    }

    /// Qdrant point ids must be UUIDs; derive one deterministically from
    /// the entry id so upserts stay idempotent.
    fn point_id(entry_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, entry_id.as_bytes()).to_string()
    }

    async fn count_with_filter(&self, filter: Option<Filter>) -> Result<u64, VectorStoreError> {
        let mut count = 0u64;
        let mut offset: Option<qdrant_client::qdrant::PointId> = None;

        loop {
            let mut scroll = ScrollPointsBuilder::new(&self.collection)
                .limit(256)
                .with_payload(false)
                .with_vectors(false);
            if let Some(ref f) = filter {
                scroll = scroll.filter(f.clone());
            }
            if let Some(off) = offset {
                scroll = scroll.offset(off);
            }

            let response = self
                .client
                .scroll(scroll)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            count += response.result.len() as u64;
            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(count)
    }
}

fn str_payload(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(|v| match &v.kind {
            Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn int_payload(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> i64 {
    payload
        .get(key)
        .and_then(|v| match &v.kind {
            Some(qdrant_client::qdrant::value::Kind::IntegerValue(n)) => Some(*n),
            _ => None,
        })
        .unwrap_or_default()
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert(&self, entries: Vec<ChunkEntry>) -> Result<(), VectorStoreError> {
        if entries.is_empty() {
            return Ok(());
        }

        for entry in &entries {
            if entry.vector.len() as u64 != self.dimension {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: self.dimension as usize,
                    actual: entry.vector.len(),
                });
            }
        }

        let points: Vec<PointStruct> = entries
            .into_iter()
            .map(|entry| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert("entry_id".to_string(), entry.id.clone().into());
                payload.insert("text".to_string(), entry.text.into());
                payload.insert(
                    "dataset_id".to_string(),
                    entry.metadata.dataset_id.into(),
                );
                payload.insert(
                    "dataset_name".to_string(),
                    entry.metadata.dataset_name.into(),
                );
                payload.insert(
                    "source_title".to_string(),
                    entry.metadata.source_title.into(),
                );
                payload.insert(
                    "chunk_index".to_string(),
                    i64::from(entry.metadata.chunk_index).into(),
                );
                payload.insert(
                    "char_count".to_string(),
                    (entry.metadata.char_count as i64).into(),
                );
                payload.insert("created_at".to_string(), entry.metadata.created_at.into());

                PointStruct::new(Self::point_id(&entry.id), entry.vector, payload)
            })
            .collect();

        let upsert = UpsertPointsBuilder::new(&self.collection, points);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: u32,
        min_score: f32,
        dataset_filter: Option<&[String]>,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        if let Some(ids) = dataset_filter
            && ids.is_empty()
        {
            return Ok(Vec::new());
        }

        let mut search = SearchPointsBuilder::new(
            &self.collection,
            query_vector.to_vec(),
            u64::from(top_k),
        )
        .with_payload(true)
        .score_threshold(min_score);

        if let Some(ids) = dataset_filter {
            search = search.filter(Self::dataset_filter(ids));
        }

        let results = self
            .client
            .search_points(search)
            .await
            .map_err(|e| VectorStoreError::Search(e.to_string()))?;

        let hits = results
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                ScoredChunk {
                    id: str_payload(&payload, "entry_id"),
                    text: str_payload(&payload, "text"),
                    score: point.score.clamp(0.0, 1.0),
                    metadata: ChunkMetadata {
                        dataset_id: str_payload(&payload, "dataset_id"),
                        dataset_name: str_payload(&payload, "dataset_name"),
                        source_title: str_payload(&payload, "source_title"),
                        chunk_index: int_payload(&payload, "chunk_index") as u32,
                        char_count: int_payload(&payload, "char_count") as usize,
                        created_at: str_payload(&payload, "created_at"),
                    },
                }
            })
            .filter(|hit| hit.score >= min_score)
            .collect();

        Ok(hits)
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Result<u64, VectorStoreError> {
        let filter = Self::dataset_filter(&[dataset_id.to_string()]);
        let count = self.count_with_filter(Some(filter.clone())).await?;

        if count == 0 {
            return Ok(0);
        }

        let delete = DeletePointsBuilder::new(&self.collection).points(filter);

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| VectorStoreError::Delete(e.to_string()))?;

        Ok(count)
    }

    async fn count_by_dataset(&self, dataset_id: &str) -> Result<u64, VectorStoreError> {
        let filter = Self::dataset_filter(&[dataset_id.to_string()]);
        self.count_with_filter(Some(filter)).await
    }

    async fn stats(&self) -> Result<IndexStats, VectorStoreError> {
        let mut per_dataset: BTreeMap<String, u64> = BTreeMap::new();
        let mut total = 0u64;
        let mut offset: Option<qdrant_client::qdrant::PointId> = None;

        loop {
            let mut scroll = ScrollPointsBuilder::new(&self.collection)
                .limit(256)
                .with_payload(PayloadIncludeSelector {
                    fields: vec!["dataset_id".to_string()],
                })
                .with_vectors(false);
            if let Some(off) = offset {
                scroll = scroll.offset(off);
            }

            let response = self
                .client
                .scroll(scroll)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            for point in &response.result {
                total += 1;
                if let Some(qdrant_client::qdrant::value::Kind::StringValue(id)) = point
                    .payload
                    .get("dataset_id")
                    .and_then(|v| v.kind.as_ref())
                {
                    *per_dataset.entry(id.clone()).or_insert(0) += 1;
                }
            }

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(IndexStats {
            total_vectors: total,
            per_dataset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_deterministic() {
        let a = QdrantVectorStore::point_id("ds1_0");
        let b = QdrantVectorStore::point_id("ds1_0");
        assert_eq!(a, b);
        assert_eq!(a.len(), 36);

        let c = QdrantVectorStore::point_id("ds1_1");
        assert_ne!(a, c);
    }
}
