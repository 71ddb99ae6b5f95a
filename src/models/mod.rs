mod chunk;
mod config;
mod dataset;
mod observability;

pub use chunk::{Chunk, ChunkEntry, ChunkMetadata, ScoredChunk};
pub use config::{
    CONTEXT_PLACEHOLDER, ChunkingConfig, Config, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_QDRANT_URL, EmbeddingConfig, GenerationConfig, LlmModel,
    ModelPricing, PipelineDefaults, QUERY_PLACEHOLDER, VectorDriver, VectorStoreConfig,
};
pub use dataset::{ChunkingStrategy, Dataset};
pub use observability::{
    EmbeddingDetails, GenerationDetails, ObservabilityRecord, QueryRequest, QueryResponse,
    RetrievalDetails, StageDetails, StageName, StageRecord,
};
