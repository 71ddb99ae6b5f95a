//! Embedding provider: turns text into unit-length vectors.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams, TruncationStrategy};

use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;

/// Model metadata exposed to the pipeline's observability record.
#[derive(Debug, Clone)]
pub struct EmbeddingInfo {
    pub model_name: String,
    pub dimensions: u32,
    pub max_sequence_length: u32,
}

/// Text-to-vector contract. Implementations must return unit-normalized
/// vectors, preserve input order 1:1, and fail batches atomically.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of document chunks, order-preserving.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn info(&self) -> EmbeddingInfo;
}

/// Local sentence-transformer model run through ONNX Runtime. Loaded once
/// at construction and shared read-only across concurrent queries; the
/// session itself is serialized behind a mutex.
pub struct LocalEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    info: EmbeddingInfo,
    batch_size: usize,
}

impl LocalEmbedder {
    pub fn load(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let model_dir = Path::new(&config.model_dir);
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(EmbeddingError::Unavailable(format!(
                "model not found: {}",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?
            .with_intra_threads(num_cpus())
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_sequence_length as usize,
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            }))
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(
            model = %config.model_name,
            dimensions = config.dimension,
            "embedding model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            info: EmbeddingInfo {
                model_name: config.model_name.clone(),
                dimensions: config.dimension,
                max_sequence_length: config.max_sequence_length,
            },
            batch_size: config.batch_size.max(1) as usize,
        })
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        let batch_size = encodings.len();
        let dimension = self.info.dimensions as usize;

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            for (j, (&id, &m)) in ids.iter().zip(mask.iter()).enumerate() {
                input_ids[i * max_len + j] = id as i64;
                attention_mask[i * max_len + j] = m as i64;
            }
        }

        let input_ids_tensor = Tensor::from_array(([batch_size, max_len], input_ids))
            .map_err(|e: ort::Error| EmbeddingError::Inference(e.to_string()))?;
        let attention_mask_tensor =
            Tensor::from_array(([batch_size, max_len], attention_mask.clone()))
                .map_err(|e: ort::Error| EmbeddingError::Inference(e.to_string()))?;
        let token_type_ids_tensor = Tensor::from_array(([batch_size, max_len], token_type_ids))
            .map_err(|e: ort::Error| EmbeddingError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EmbeddingError::Inference("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![
                input_ids_tensor,
                attention_mask_tensor,
                token_type_ids_tensor
            ])
            .map_err(|e: ort::Error| EmbeddingError::Inference(e.to_string()))?;

        let output_array = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e: ort::Error| EmbeddingError::Inference(e.to_string()))?;

        let shape = output_array.shape();
        if shape.len() != 3 || shape[2] != dimension {
            return Err(EmbeddingError::Inference(format!(
                "unexpected output shape: {:?}, expected [batch, seq, {}]",
                shape, dimension
            )));
        }

        // Mean pooling over unpadded token positions, then L2 normalize.
        let embeddings = (0..batch_size)
            .map(|i| {
                let mut pooled = vec![0f32; dimension];
                let mut token_count = 0f32;
                for j in 0..max_len {
                    if attention_mask[i * max_len + j] == 0 {
                        continue;
                    }
                    token_count += 1.0;
                    for (d, p) in pooled.iter_mut().enumerate() {
                        *p += output_array[[i, j, d]];
                    }
                }
                if token_count > 0.0 {
                    for p in pooled.iter_mut() {
                        *p /= token_count;
                    }
                }
                normalize(&pooled)
            })
            .collect();

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Sub-batch for memory; any failure aborts the whole call so no
        // partial vector list escapes.
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            all.extend(self.embed_batch(batch)?);
        }
        Ok(all)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Inference("empty embedding output".to_string()))
    }

    fn info(&self) -> EmbeddingInfo {
        self.info.clone()
    }
}

pub(crate) fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize(&[3.0, 4.0]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        let v = normalize(&[0.0, 0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_load_missing_model_is_unavailable() {
        let config = EmbeddingConfig {
            model_dir: "/nonexistent/raglab-models".to_string(),
            ..Default::default()
        };
        match LocalEmbedder::load(&config) {
            Err(EmbeddingError::Unavailable(_)) => {}
            other => panic!("expected Unavailable, got {:?}", other.map(|_| ())),
        }
    }
}
