//! The query pipeline: embed, retrieve, generate.
//!
//! Every run produces an [`ObservabilityRecord`] describing each stage's
//! latency and details. Failed runs return the record too, holding exactly
//! the stages that completed before the failure.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::models::{
    CONTEXT_PLACEHOLDER, EmbeddingDetails, GenerationDetails, ObservabilityRecord,
    PipelineDefaults, QUERY_PLACEHOLDER, QueryRequest, QueryResponse, RetrievalDetails,
    ScoredChunk, StageDetails, StageName, StageRecord,
};
use crate::services::embedding::EmbeddingProvider;
use crate::services::generation::{GenerationClient, GenerationParams};
use crate::services::registry::DatasetRegistry;
use crate::services::vector_store::VectorStore;
use crate::utils::retry::Retryable;

const EMBEDDING_PREVIEW_LEN: usize = 5;
const EMPTY_CONTEXT: &str = "No relevant context found.";

/// A failed run still carries the trace of the stages that finished.
#[derive(Debug)]
pub struct QueryFailure {
    pub error: PipelineError,
    pub observability: ObservabilityRecord,
}

impl Retryable for QueryFailure {
    fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    registry: Arc<DatasetRegistry>,
    llm: Arc<dyn GenerationClient>,
    defaults: PipelineDefaults,
}

struct ResolvedParams {
    top_k: u32,
    min_score: f32,
    model: crate::models::LlmModel,
    temperature: f32,
    max_tokens: u32,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        registry: Arc<DatasetRegistry>,
        llm: Arc<dyn GenerationClient>,
        defaults: PipelineDefaults,
    ) -> Self {
        Self {
            embedder,
            store,
            registry,
            llm,
            defaults,
        }
    }

    /// Run one query end to end. Cancellation is honored between stages
    /// and during generation; a cancelled run fails with the partial trace.
    pub async fn query(
        &self,
        request: QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<QueryResponse, QueryFailure> {
        let started = Instant::now();
        let mut steps: Vec<StageRecord> = Vec::with_capacity(3);
        let mut full_prompt = String::new();

        match self
            .run_stages(&request, cancel, &started, &mut steps, &mut full_prompt)
            .await
        {
            Ok(answer) => Ok(QueryResponse {
                answer,
                observability: ObservabilityRecord {
                    total_latency_ms: started.elapsed().as_millis() as u64,
                    steps,
                    full_prompt,
                },
            }),
            Err(error) => {
                warn!(%error, stage = ?error.failed_stage(), "query failed");
                Err(QueryFailure {
                    error,
                    observability: ObservabilityRecord {
                        total_latency_ms: started.elapsed().as_millis() as u64,
                        steps,
                        full_prompt,
                    },
                })
            }
        }
    }

    async fn run_stages(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
        started: &Instant,
        steps: &mut Vec<StageRecord>,
        full_prompt: &mut String,
    ) -> Result<String, PipelineError> {
        let params = self.resolve_params(request)?;

        if request.query.trim().is_empty() {
            return Err(PipelineError::InvalidConfiguration(
                "query must not be empty".to_string(),
            ));
        }

        // None means "all enabled datasets"; an explicit empty list stays
        // empty and retrieves nothing.
        let dataset_filter = match &request.enabled_datasets {
            Some(ids) => ids.clone(),
            None => self.registry.enabled_ids()?,
        };

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // Stage 1: embed the query.
        let stage_start = Instant::now();
        let query_vector = self.embedder.embed_query(&request.query).await?;
        let embed_info = self.embedder.info();
        steps.push(StageRecord {
            name: StageName::Embedding,
            latency_ms: stage_start.elapsed().as_millis() as u64,
            details: StageDetails::Embedding(EmbeddingDetails {
                model: embed_info.model_name,
                dimensions: embed_info.dimensions,
                vector_length: query_vector.len(),
                embedding_preview: query_vector
                    .iter()
                    .take(EMBEDDING_PREVIEW_LEN)
                    .copied()
                    .collect(),
            }),
        });

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // Stage 2: retrieve candidate chunks.
        let stage_start = Instant::now();
        let chunks = self
            .store
            .search(
                &query_vector,
                params.top_k,
                params.min_score,
                Some(dataset_filter.as_slice()),
            )
            .await?;
        debug!(chunks_found = chunks.len(), "retrieval complete");
        steps.push(StageRecord {
            name: StageName::Retrieval,
            latency_ms: stage_start.elapsed().as_millis() as u64,
            details: StageDetails::Retrieval(RetrievalDetails {
                chunks_found: chunks.len(),
                chunks: chunks.clone(),
                top_k: params.top_k,
                min_score: params.min_score,
                enabled_datasets: request.enabled_datasets.clone(),
            }),
        });

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // Prompt construction happens between stages and is not timed.
        let context = format_context(&chunks);
        *full_prompt = render_template(&self.defaults.system_prompt, &context, &request.query)?;

        // Stage 3: generate the answer. Generation failures are fatal for
        // this query; retry policy lives at the CLI boundary.
        let stage_start = Instant::now();
        let gen_params = GenerationParams {
            model: params.model,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = self.llm.generate(full_prompt, &gen_params) => result?,
        };
        steps.push(StageRecord {
            name: StageName::LlmGeneration,
            latency_ms: stage_start.elapsed().as_millis() as u64,
            details: StageDetails::Generation(GenerationDetails {
                model: params.model,
                prompt_tokens: result.prompt_tokens,
                completion_tokens: result.completion_tokens,
                total_tokens: result.total_tokens,
                cost: result.cost,
                temperature: params.temperature,
                max_tokens: params.max_tokens,
            }),
        });

        info!(
            total_latency_ms = started.elapsed().as_millis() as u64,
            total_tokens = result.total_tokens,
            "query complete"
        );

        Ok(result.text)
    }

    fn resolve_params(&self, request: &QueryRequest) -> Result<ResolvedParams, PipelineError> {
        let params = ResolvedParams {
            top_k: request.top_k.unwrap_or(self.defaults.top_k),
            min_score: request.min_score.unwrap_or(self.defaults.min_score),
            model: request.model.unwrap_or(self.defaults.model),
            temperature: request.temperature.unwrap_or(self.defaults.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.defaults.max_tokens),
        };

        if params.top_k < 1 || params.top_k > 100 {
            return Err(PipelineError::InvalidConfiguration(format!(
                "top_k must be between 1 and 100, got {}",
                params.top_k
            )));
        }
        if !(0.0..=1.0).contains(&params.min_score) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "min_score must be between 0.0 and 1.0, got {}",
                params.min_score
            )));
        }
        if !(0.0..=2.0).contains(&params.temperature) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                params.temperature
            )));
        }
        if params.max_tokens < 50 || params.max_tokens > 4000 {
            return Err(PipelineError::InvalidConfiguration(format!(
                "max_tokens must be between 50 and 4000, got {}",
                params.max_tokens
            )));
        }

        Ok(params)
    }
}

/// Render retrieved chunks as a numbered context block for the prompt.
fn format_context(chunks: &[ScoredChunk]) -> String {
    if chunks.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[Source {}: {} (relevance: {:.2})]\n{}",
                i + 1,
                chunk.metadata.source_title,
                chunk.score,
                chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_template(template: &str, context: &str, query: &str) -> Result<String, PipelineError> {
    if !template.contains(CONTEXT_PLACEHOLDER) {
        return Err(PipelineError::Template(format!(
            "system prompt is missing the {CONTEXT_PLACEHOLDER} placeholder"
        )));
    }
    if !template.contains(QUERY_PLACEHOLDER) {
        return Err(PipelineError::Template(format!(
            "system prompt is missing the {QUERY_PLACEHOLDER} placeholder"
        )));
    }

    Ok(template
        .replace(CONTEXT_PLACEHOLDER, context)
        .replace(QUERY_PLACEHOLDER, query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn scored(title: &str, score: f32, text: &str) -> ScoredChunk {
        ScoredChunk {
            id: format!("{title}_0"),
            text: text.to_string(),
            score,
            metadata: ChunkMetadata {
                dataset_id: "ds".to_string(),
                dataset_name: "ds".to_string(),
                source_title: title.to_string(),
                chunk_index: 0,
                char_count: text.chars().count(),
                created_at: String::new(),
            },
        }
    }

    #[test]
    fn test_format_context_numbers_sources() {
        let chunks = vec![
            scored("fables", 0.91, "The fox and the grapes."),
            scored("fables", 0.52, "The tortoise and the hare."),
        ];
        let context = format_context(&chunks);
        assert!(context.starts_with("[Source 1: fables (relevance: 0.91)]"));
        assert!(context.contains("[Source 2: fables (relevance: 0.52)]"));
        assert!(context.contains("The tortoise and the hare."));
    }

    #[test]
    fn test_format_context_empty() {
        assert_eq!(format_context(&[]), EMPTY_CONTEXT);
    }

    #[test]
    fn test_render_template() {
        let rendered = render_template(
            "Context:\n{retrieved_chunks}\n\nQ: {user_query}",
            "some context",
            "why?",
        )
        .unwrap();
        assert_eq!(rendered, "Context:\nsome context\n\nQ: why?");
    }

    #[test]
    fn test_render_template_missing_placeholder() {
        let err = render_template("no placeholders here", "c", "q").unwrap_err();
        assert!(matches!(err, PipelineError::Template(_)));
    }
}
