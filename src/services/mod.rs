//! Core services: chunking, embedding, retrieval, generation, and the
//! pipeline that ties them together.

pub mod chunker;
pub mod embedding;
pub mod generation;
pub mod ingestion;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod vector_store;

pub use chunker::TextChunker;
pub use embedding::{EmbeddingProvider, LocalEmbedder};
pub use generation::{GenerationClient, GenerationParams, GenerationResult, OpenAiClient};
pub use ingestion::{IngestOptions, IngestReport, IngestionService};
pub use metrics::{QueryLog, QuerySummary};
pub use pipeline::{QueryFailure, RagPipeline};
pub use registry::DatasetRegistry;
pub use vector_store::{IndexStats, VectorStore, create_backend};
