//! Dataset records and chunking strategy selection.

use serde::{Deserialize, Serialize};

/// How a document is split into chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    /// Fixed-size character windows with exact overlap. May split mid-word.
    Characters,
    /// Sentence-preserving accumulation with approximate overlap.
    #[default]
    Sentences,
}

impl std::str::FromStr for ChunkingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "characters" | "chars" => Ok(ChunkingStrategy::Characters),
            "sentences" => Ok(ChunkingStrategy::Sentences),
            _ => Err(format!("unknown chunking strategy: {}", s)),
        }
    }
}

impl std::fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkingStrategy::Characters => write!(f, "characters"),
            ChunkingStrategy::Sentences => write!(f, "sentences"),
        }
    }
}

/// A named, toggleable collection of chunks sharing one chunking
/// configuration. Disabling excludes its chunks from retrieval without
/// deleting anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub strategy: ChunkingStrategy,
    pub num_chunks: u32,
    pub file_size: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl Dataset {
    pub fn new(
        name: impl Into<String>,
        chunk_size: u32,
        chunk_overlap: u32,
        strategy: ChunkingStrategy,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            enabled: true,
            chunk_size,
            chunk_overlap,
            strategy,
            num_chunks: 0,
            file_size: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "characters".parse::<ChunkingStrategy>().unwrap(),
            ChunkingStrategy::Characters
        );
        assert_eq!(
            "Sentences".parse::<ChunkingStrategy>().unwrap(),
            ChunkingStrategy::Sentences
        );
        assert!("words".parse::<ChunkingStrategy>().is_err());
    }

    #[test]
    fn test_new_dataset_enabled_by_default() {
        let dataset = Dataset::new("aesop", 500, 50, ChunkingStrategy::Sentences);
        assert!(dataset.enabled);
        assert_eq!(dataset.id.len(), 36);
        assert_eq!(dataset.num_chunks, 0);
    }
}
