//! Query request/response types and the per-query observability record.

use serde::{Deserialize, Serialize};

use super::chunk::ScoredChunk;
use super::config::LlmModel;

/// The three pipeline stages, always recorded in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Embedding,
    Retrieval,
    LlmGeneration,
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageName::Embedding => write!(f, "embedding"),
            StageName::Retrieval => write!(f, "retrieval"),
            StageName::LlmGeneration => write!(f, "llm_generation"),
        }
    }
}

/// Stage-specific detail payloads. Statically typed per stage, but
/// serialized untagged so the wire shape stays the open key/value map the
/// UI layer expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageDetails {
    Embedding(EmbeddingDetails),
    Retrieval(RetrievalDetails),
    Generation(GenerationDetails),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingDetails {
    pub model: String,
    pub dimensions: u32,
    pub vector_length: usize,
    /// First few vector components, for display only
    pub embedding_preview: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalDetails {
    pub chunks_found: usize,
    pub chunks: Vec<ScoredChunk>,
    pub top_k: u32,
    pub min_score: f32,
    /// None means "all enabled datasets"
    pub enabled_datasets: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationDetails {
    pub model: LlmModel,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost: f64,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Timing and details for one completed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: StageName,
    pub latency_ms: u64,
    pub details: StageDetails,
}

/// The structured trace of one pipeline run. Assembled once, never mutated
/// afterward; owned by the response (or failure) it is attached to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityRecord {
    pub total_latency_ms: u64,
    pub steps: Vec<StageRecord>,
    /// Exact text sent to the generation model; empty if the run failed
    /// before prompt construction.
    pub full_prompt: String,
}

/// A user query with optional per-query overrides. Absent fields fall back
/// to the process-wide pipeline defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<LlmModel>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Restrict retrieval to these dataset ids. None = all enabled
    /// datasets; an explicitly empty list retrieves nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_datasets: Option<Vec<String>>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: None,
            min_score: None,
            model: None,
            temperature: None,
            max_tokens: None,
            enabled_datasets: None,
        }
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_model(mut self, model: LlmModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_enabled_datasets(mut self, ids: Vec<String>) -> Self {
        self.enabled_datasets = Some(ids);
        self
    }
}

/// Successful pipeline output: the answer plus the full trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub observability: ObservabilityRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_builder() {
        let request = QueryRequest::new("what is the moral?")
            .with_top_k(5)
            .with_min_score(0.2)
            .with_model(LlmModel::Gpt4oMini);

        assert_eq!(request.query, "what is the moral?");
        assert_eq!(request.top_k, Some(5));
        assert_eq!(request.min_score, Some(0.2));
        assert_eq!(request.model, Some(LlmModel::Gpt4oMini));
        assert!(request.enabled_datasets.is_none());
    }

    #[test]
    fn test_stage_name_serializes_snake_case() {
        let json = serde_json::to_string(&StageName::LlmGeneration).unwrap();
        assert_eq!(json, "\"llm_generation\"");
    }

    #[test]
    fn test_details_serialize_flat() {
        let details = StageDetails::Embedding(EmbeddingDetails {
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            vector_length: 384,
            embedding_preview: vec![0.1, 0.2],
        });
        let value = serde_json::to_value(&details).unwrap();
        // Untagged: no wrapper key, the map is the payload itself.
        assert_eq!(value["model"], "all-MiniLM-L6-v2");
        assert_eq!(value["dimensions"], 384);
        assert!(value.get("Embedding").is_none());
    }
}
