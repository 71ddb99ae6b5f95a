//! LLM generation over the OpenAI-compatible chat completions API.
//!
//! Each call returns the answer text together with token usage and an
//! estimated cost, so the pipeline can surface spend per query.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::models::{GenerationConfig, LlmModel};

/// Sampling parameters resolved by the pipeline for one query.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub model: LlmModel,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Answer text plus usage accounting for a single completion.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    /// Wall-clock time of the outbound call itself, excluding prompt
    /// construction.
    pub latency_ms: u64,
    /// Estimated cost in USD, from the configured per-million-token rates.
    pub cost: f64,
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<GenerationResult, GenerationError>;
}

#[derive(Debug)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    config: GenerationConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAiClient {
    /// Builds a client with the API key read from the configured
    /// environment variable. Fails fast when the key is absent so the
    /// pipeline reports a clear error before any retrieval work runs.
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GenerationError::MissingApiKey(config.api_key_env.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            config: config.clone(),
        })
    }

    fn estimate_cost(&self, model: LlmModel, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        let pricing = self.config.pricing_for(model);
        let input_cost = f64::from(prompt_tokens) / 1_000_000.0 * pricing.input;
        let output_cost = f64::from(completion_tokens) / 1_000_000.0 * pricing.output;
        input_cost + output_cost
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<GenerationResult, GenerationError> {
        let url = format!("{}/v1/chat/completions", self.api_base);

        let body = json!({
            "model": params.model.as_str(),
            "messages": [{"role": "user", "content": prompt}],
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        debug!(model = %params.model, "sending chat completion request");

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, "chat completion request failed");
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited,
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    GenerationError::Rejected(detail)
                }
                _ => GenerationError::Request(format!("{status}: {detail}")),
            });
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let choice = payload
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::InvalidResponse("no choices returned".to_string()))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(GenerationError::Rejected(
                "completion stopped by content filter".to_string(),
            ));
        }

        let text = choice
            .message
            .content
            .ok_or_else(|| GenerationError::InvalidResponse("empty message content".to_string()))?;

        let usage = payload.usage.unwrap_or(ChatUsage {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
        });

        let cost = self.estimate_cost(params.model, usage.prompt_tokens, usage.completion_tokens);

        Ok(GenerationResult {
            text,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            latency_ms,
            cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenerationConfig;

    fn client_with_key() -> OpenAiClient {
        let config = GenerationConfig::default();
        OpenAiClient {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: "test-key".to_string(),
            config,
        }
    }

    #[test]
    fn test_cost_uses_per_million_rates() {
        let client = client_with_key();
        // gpt-4o: $2.50 input, $10.00 output per 1M tokens
        let cost = client.estimate_cost(LlmModel::Gpt4o, 1_000_000, 1_000_000);
        assert!((cost - 12.50).abs() < 1e-9);
    }

    #[test]
    fn test_cost_for_small_usage() {
        let client = client_with_key();
        let cost = client.estimate_cost(LlmModel::Gpt4oMini, 1000, 500);
        // 1000 * 0.15/1M + 500 * 0.60/1M
        assert!((cost - 0.00045).abs() < 1e-9);
    }

    #[test]
    fn test_missing_api_key() {
        let config = GenerationConfig {
            api_key_env: "RAGLAB_TEST_NO_SUCH_KEY".to_string(),
            ..GenerationConfig::default()
        };
        let err = OpenAiClient::new(&config).unwrap_err();
        assert!(matches!(err, GenerationError::MissingApiKey(_)));
    }
}
