//! Chunk types shared by the chunker, vector index, and pipeline.

use serde::{Deserialize, Serialize};

/// A contiguous span of source text produced by the chunker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Ordinal within the source document, zero-based
    pub chunk_index: u32,
    /// Character offset of the span start
    pub start_char: usize,
    /// Character offset one past the span end
    pub end_char: usize,
    pub char_count: usize,
}

/// Metadata stored alongside every indexed chunk and echoed back in
/// retrieval results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub dataset_id: String,
    pub dataset_name: String,
    pub source_title: String,
    pub chunk_index: u32,
    pub char_count: usize,
    pub created_at: String,
}

/// One entry handed to the vector index: chunk text, its embedding, and
/// metadata. The id is deterministic per (dataset, chunk_index).
#[derive(Debug, Clone)]
pub struct ChunkEntry {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl ChunkEntry {
    pub fn new(text: String, vector: Vec<f32>, metadata: ChunkMetadata) -> Self {
        let id = format!("{}_{}", metadata.dataset_id, metadata.chunk_index);
        Self {
            id,
            text,
            vector,
            metadata,
        }
    }
}

/// A retrieval hit: chunk text with its similarity score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(dataset_id: &str, chunk_index: u32) -> ChunkMetadata {
        ChunkMetadata {
            dataset_id: dataset_id.to_string(),
            dataset_name: "test".to_string(),
            source_title: "test.txt".to_string(),
            chunk_index,
            char_count: 5,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_entry_id_is_deterministic() {
        let a = ChunkEntry::new("hello".to_string(), vec![1.0], metadata("ds1", 3));
        let b = ChunkEntry::new("hello".to_string(), vec![1.0], metadata("ds1", 3));
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, "ds1_3");

        let c = ChunkEntry::new("hello".to_string(), vec![1.0], metadata("ds1", 4));
        assert_ne!(a.id, c.id);
    }
}
