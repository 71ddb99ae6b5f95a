use serde::{Deserialize, Serialize};

use super::dataset::ChunkingStrategy;

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "raglab";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;

/// System prompt template. Both placeholders are required; the pipeline
/// refuses to run with a template that lost either one.
pub const CONTEXT_PLACEHOLDER: &str = "{retrieved_chunks}";
pub const QUERY_PLACEHOLDER: &str = "{user_query}";

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant that answers questions based on the provided documents.

Use the following context to answer the question. If the answer cannot be found in the context, say so.

Context:
{retrieved_chunks}

Question: {user_query}

Answer:";

/// Generation model identifiers. A fixed set; unknown names are rejected at
/// the boundary rather than forwarded to the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LlmModel {
    #[default]
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "gpt-4-turbo")]
    Gpt4Turbo,
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl LlmModel {
    pub const ALL: [LlmModel; 5] = [
        LlmModel::Gpt4o,
        LlmModel::Gpt4oMini,
        LlmModel::Gpt4Turbo,
        LlmModel::Gpt4,
        LlmModel::Gpt35Turbo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmModel::Gpt4o => "gpt-4o",
            LlmModel::Gpt4oMini => "gpt-4o-mini",
            LlmModel::Gpt4Turbo => "gpt-4-turbo",
            LlmModel::Gpt4 => "gpt-4",
            LlmModel::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }
}

impl std::str::FromStr for LlmModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpt-4o" => Ok(LlmModel::Gpt4o),
            "gpt-4o-mini" => Ok(LlmModel::Gpt4oMini),
            "gpt-4-turbo" => Ok(LlmModel::Gpt4Turbo),
            "gpt-4" => Ok(LlmModel::Gpt4),
            "gpt-3.5-turbo" => Ok(LlmModel::Gpt35Turbo),
            _ => Err(format!("unknown model: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub pipeline: PipelineDefaults,
}

impl Config {
    pub fn config_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|p| p.join("raglab").join("config.toml"))
    }

    /// Directory for the dataset registry and query-metrics databases.
    pub fn data_dir() -> Option<std::path::PathBuf> {
        dirs::data_dir().map(|p| p.join("raglab"))
    }

    pub fn load() -> Result<Self, crate::error::ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            return Ok(config);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<(), crate::error::ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            crate::error::ConfigError::Path("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError::Validation;

        if self.chunking.chunk_size == 0 {
            return Err(Validation("chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Validation(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if !(1..=100).contains(&self.pipeline.top_k) {
            return Err(Validation("top_k must be between 1 and 100".to_string()));
        }
        if !(0.0..=1.0).contains(&self.pipeline.min_score) {
            return Err(Validation(
                "min_score must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.pipeline.temperature) {
            return Err(Validation(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if !(50..=4000).contains(&self.pipeline.max_tokens) {
            return Err(Validation(
                "max_tokens must be between 50 and 4000".to_string(),
            ));
        }
        if !self.pipeline.system_prompt.contains(CONTEXT_PLACEHOLDER)
            || !self.pipeline.system_prompt.contains(QUERY_PLACEHOLDER)
        {
            return Err(Validation(format!(
                "system_prompt must contain {} and {}",
                CONTEXT_PLACEHOLDER, QUERY_PLACEHOLDER
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Directory holding model.onnx and tokenizer.json
    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    #[serde(default = "default_embedding_model")]
    pub model_name: String,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: u32,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_model_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("raglab").join("models").display().to_string())
        .unwrap_or_else(|| "./models".to_string())
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_max_sequence_length() -> u32 {
    256
}

fn default_batch_size() -> u32 {
    32
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            model_name: default_embedding_model(),
            dimension: default_dimension(),
            max_sequence_length: default_max_sequence_length(),
            batch_size: default_batch_size(),
        }
    }
}

/// Which vector index backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    /// In-process index, no external service required
    #[default]
    Memory,
    /// Remote Qdrant collection
    Qdrant,
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDriver::Memory => write!(f, "memory"),
            VectorDriver::Qdrant => write!(f, "qdrant"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
        }
    }
}

/// Per-model pricing, USD per 1M tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model: LlmModel,
    pub input: f64,
    pub output: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_openai_url")]
    pub api_base: String,

    /// Environment variable holding the API key (loaded via dotenv)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_pricing")]
    pub pricing: Vec<ModelPricing>,
}

fn default_openai_url() -> String {
    DEFAULT_OPENAI_URL.to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_generation_timeout() -> u64 {
    60
}

fn default_pricing() -> Vec<ModelPricing> {
    vec![
        ModelPricing { model: LlmModel::Gpt4o, input: 2.50, output: 10.00 },
        ModelPricing { model: LlmModel::Gpt4oMini, input: 0.15, output: 0.60 },
        ModelPricing { model: LlmModel::Gpt4Turbo, input: 10.00, output: 30.00 },
        ModelPricing { model: LlmModel::Gpt4, input: 30.00, output: 60.00 },
        ModelPricing { model: LlmModel::Gpt35Turbo, input: 0.50, output: 1.50 },
    ]
}

impl GenerationConfig {
    /// Pricing lookup; unknown models fall back to the gpt-4o rates.
    pub fn pricing_for(&self, model: LlmModel) -> ModelPricing {
        self.pricing
            .iter()
            .find(|p| p.model == model)
            .or_else(|| self.pricing.iter().find(|p| p.model == LlmModel::Gpt4o))
            .copied()
            .unwrap_or(ModelPricing {
                model,
                input: 2.50,
                output: 10.00,
            })
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_generation_timeout(),
            pricing: default_pricing(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    #[serde(default)]
    pub strategy: ChunkingStrategy,
}

fn default_chunk_size() -> u32 {
    500
}

fn default_chunk_overlap() -> u32 {
    50
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            strategy: ChunkingStrategy::default(),
        }
    }
}

/// Process-wide defaults for per-query pipeline parameters. Every field can
/// be overridden on a single query; absent fields fall back to these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefaults {
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_min_score")]
    pub min_score: f32,

    #[serde(default)]
    pub model: LlmModel,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_top_k() -> u32 {
    3
}

fn default_min_score() -> f32 {
    0.0
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
            model: LlmModel::default(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.top_k, 3);
        assert_eq!(config.pipeline.model, LlmModel::Gpt4o);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.vector_store.driver, VectorDriver::Memory);
    }

    #[test]
    fn test_validate_rejects_overlap_ge_size() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_template() {
        let mut config = Config::default();
        config.pipeline.system_prompt = "Answer: {user_query}".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_model_parse_roundtrip() {
        for model in LlmModel::ALL {
            assert_eq!(model.as_str().parse::<LlmModel>().unwrap(), model);
        }
        assert!("gpt-5".parse::<LlmModel>().is_err());
    }

    #[test]
    fn test_pricing_lookup() {
        let config = GenerationConfig::default();
        let p = config.pricing_for(LlmModel::Gpt4oMini);
        assert_eq!(p.input, 0.15);
        assert_eq!(p.output, 0.60);
    }
}
