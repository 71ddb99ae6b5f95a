//! Error types for the RAG pipeline and its collaborators.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors related to text chunking.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("invalid chunking configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model unavailable: {0}")]
    Unavailable(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("embedding inference failed: {0}")]
    Inference(String),
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        // The model is local; a failed load or inference will fail again.
        false
    }
}

/// Errors related to vector index operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector dimension mismatch: index holds {expected}-dim vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("failed to connect to vector store: {0}")]
    Connection(String),

    #[error("collection error: {0}")]
    Collection(String),

    #[error("upsert error: {0}")]
    Upsert(String),

    #[error("search error: {0}")]
    Search(String),

    #[error("delete error: {0}")]
    Delete(String),
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        matches!(self, VectorStoreError::Connection(_))
    }
}

/// Errors raised by the generation client. The three remote failure kinds
/// are kept distinct so callers can choose their own retry policy.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation timed out")]
    Timeout,

    #[error("generation rate limited")]
    RateLimited,

    #[error("generation rejected: {0}")]
    Rejected(String),

    #[error("generation request failed: {0}")]
    Request(String),

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("missing API key: {0}")]
    MissingApiKey(String),
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::RateLimited)
    }
}

/// Errors surfaced by the query pipeline, tagged by the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfiguration(String),

    #[error("embedding stage failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("retrieval stage failed: {0}")]
    Retrieval(#[from] VectorStoreError),

    #[error("generation stage failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("system prompt template error: {0}")]
    Template(String),

    #[error("dataset registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("query cancelled")]
    Cancelled,
}

impl PipelineError {
    /// The pipeline stage this error aborted, if any. `InvalidConfiguration`
    /// and `Template` fire before or between stages.
    pub fn failed_stage(&self) -> Option<&'static str> {
        match self {
            PipelineError::Embedding(_) => Some("embedding"),
            PipelineError::Retrieval(_) => Some("retrieval"),
            PipelineError::Generation(_) => Some("llm_generation"),
            _ => None,
        }
    }
}

impl Retryable for PipelineError {
    fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Generation(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Errors related to the dataset registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("registry lock poisoned")]
    Lock,

    #[error("dataset not found: {0}")]
    NotFound(String),
}

/// Errors related to document ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file read error: {0}")]
    FileRead(String),

    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("chunking error: {0}")]
    Chunk(#[from] ChunkError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    Path(String),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("{0}")]
    Other(String),
}
