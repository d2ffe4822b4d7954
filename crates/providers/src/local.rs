//! Local embedding model: runs a sentence-transformers encoder in-process.
//!
//! Uses [Candle](https://github.com/huggingface/candle) (Rust-native ML) to run
//! BERT-family encoders such as `sentence-transformers/all-MiniLM-L6-v2`
//! with no network access after the first download and no API key.
//!
//! Pooling follows sentence-transformers: token embeddings are averaged under
//! the attention mask, then L2-normalized.
//!
//! # Example
//! ```bash
//! supportdesk ingest            # embedding.provider = "local" (default)
//! SUPPORTDESK_EMBEDDING_MODEL=/models/minilm supportdesk ask "..."
//! ```

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::api::sync::Api;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use supportdesk_core::embedding::{normalize, Embedder};
use supportdesk_core::error::EmbeddingError;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tokio::sync::OnceCell;
use tracing::info;

/// Longest input, in tokens, fed to the encoder. Longer texts are truncated.
const MAX_SEQUENCE_TOKENS: usize = 256;

/// A sentence embedder backed by a local BERT model.
///
/// The model is loaded once, lazily, on the first `embed` call and shared
/// read-only afterwards.
pub struct LocalEmbedder {
    model_name: String,
    state: OnceCell<Arc<EncoderState>>,
}

/// The loaded encoder (tokenizer + weights).
struct EncoderState {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    hidden_size: usize,
}

impl LocalEmbedder {
    /// Create a new local embedder.
    ///
    /// `model_name` can be:
    /// - A HuggingFace repo id: `"sentence-transformers/all-MiniLM-L6-v2"`
    /// - A local directory holding `config.json`, `tokenizer.json` and
    ///   `model.safetensors`
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            state: OnceCell::new(),
        }
    }

    async fn state(&self) -> Result<Arc<EncoderState>, EmbeddingError> {
        let state = self
            .state
            .get_or_try_init(|| async {
                info!(model = %self.model_name, "Loading local embedding model on first use...");
                let name = self.model_name.clone();
                let loaded = tokio::task::spawn_blocking(move || EncoderState::load(&name))
                    .await
                    .map_err(|e| EmbeddingError::ModelLoad(format!("Model loading task failed: {e}")))??;
                Ok::<_, EmbeddingError>(Arc::new(loaded))
            })
            .await?;
        Ok(state.clone())
    }
}

#[derive(serde::Deserialize)]
struct EncoderDims {
    hidden_size: usize,
}

/// Files making up a sentence-transformers checkpoint.
struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

impl ModelFiles {
    fn resolve(model_name: &str) -> Result<Self, EmbeddingError> {
        let dir = Path::new(model_name);
        if dir.is_dir() {
            return Ok(Self {
                config: dir.join("config.json"),
                tokenizer: dir.join("tokenizer.json"),
                weights: dir.join("model.safetensors"),
            });
        }

        info!(repo = model_name, "Downloading/loading embedding model");

        // Download via HuggingFace Hub (cached automatically)
        let api = Api::new().map_err(|e| {
            EmbeddingError::ModelLoad(format!("Failed to initialize HuggingFace Hub API: {e}"))
        })?;
        let repo = api.model(model_name.to_string());
        let fetch = |file: &str| {
            repo.get(file).map_err(|e| {
                EmbeddingError::ModelLoad(format!(
                    "Failed to download '{file}' from '{model_name}': {e}"
                ))
            })
        };

        Ok(Self {
            config: fetch("config.json")?,
            tokenizer: fetch("tokenizer.json")?,
            weights: fetch("model.safetensors")?,
        })
    }
}

impl EncoderState {
    fn load(model_name: &str) -> Result<Self, EmbeddingError> {
        let device = Device::Cpu;
        let files = ModelFiles::resolve(model_name)?;

        let config_raw = std::fs::read_to_string(&files.config)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to read config.json: {e}")))?;
        let config: Config = serde_json::from_str(&config_raw)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to parse config.json: {e}")))?;
        let dims: EncoderDims = serde_json::from_str(&config_raw)
            .map_err(|e| EmbeddingError::ModelLoad(format!("config.json lacks hidden_size: {e}")))?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to load tokenizer: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to configure truncation: {e}")))?;

        let weights = std::fs::read(&files.weights)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to read weights: {e}")))?;
        let vb = VarBuilder::from_buffered_safetensors(weights, DTYPE, &device)
            .map_err(map_load_err)?;
        let model = BertModel::load(vb, &config).map_err(map_load_err)?;

        info!(hidden_size = dims.hidden_size, "Local embedding model loaded successfully");

        Ok(Self {
            model,
            tokenizer,
            device,
            hidden_size: dims.hidden_size,
        })
    }

    /// Encode a batch: tokenize, run BERT, mean-pool under the mask, normalize.
    fn encode(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts, true)
            .map_err(|e| EmbeddingError::Encode(format!("Tokenization failed: {e}")))?;

        let mut ids = Vec::with_capacity(encodings.len());
        let mut masks = Vec::with_capacity(encodings.len());
        for enc in &encodings {
            ids.push(Tensor::new(enc.get_ids(), &self.device).map_err(map_encode_err)?);
            masks.push(Tensor::new(enc.get_attention_mask(), &self.device).map_err(map_encode_err)?);
        }

        let input_ids = Tensor::stack(&ids, 0).map_err(map_encode_err)?;
        let attention_mask = Tensor::stack(&masks, 0).map_err(map_encode_err)?;
        let token_type_ids = input_ids.zeros_like().map_err(map_encode_err)?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(map_encode_err)?;

        let pooled = mean_pool(&hidden, &attention_mask).map_err(map_encode_err)?;
        let mut vectors: Vec<Vec<f32>> = pooled.to_vec2().map_err(map_encode_err)?;
        for v in vectors.iter_mut() {
            if v.len() != self.hidden_size {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.hidden_size,
                    actual: v.len(),
                });
            }
            normalize(v);
        }
        Ok(vectors)
    }
}

/// Average token embeddings `[batch, seq, hidden]` over positions where the
/// mask `[batch, seq]` is 1.
fn mean_pool(hidden: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = mask.to_dtype(DType::F32)?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9f32, f32::MAX)?;
    summed.broadcast_div(&counts)
}

fn map_load_err(e: candle_core::Error) -> EmbeddingError {
    EmbeddingError::ModelLoad(format!("Candle error: {e}"))
}

fn map_encode_err(e: candle_core::Error) -> EmbeddingError {
    EmbeddingError::Encode(format!("Candle error: {e}"))
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> Option<usize> {
        self.state.get().map(|s| s.hidden_size)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state().await?;
        let texts = texts.to_vec();

        // Run inference on a blocking thread (Candle is CPU-bound)
        tokio::task::spawn_blocking(move || state.encode(texts))
            .await
            .map_err(|e| EmbeddingError::Encode(format!("Inference task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_pool_ignores_padding() {
        let device = Device::Cpu;
        // batch 1, seq 3, hidden 2; last position is padding
        let hidden = Tensor::new(&[[[1.0f32, 2.0], [3.0, 4.0], [100.0, 100.0]]], &device).unwrap();
        let mask = Tensor::new(&[[1u32, 1, 0]], &device).unwrap();
        let pooled: Vec<Vec<f32>> = mean_pool(&hidden, &mask).unwrap().to_vec2().unwrap();
        assert_eq!(pooled, vec![vec![2.0, 3.0]]);
    }

    #[tokio::test]
    async fn empty_local_directory_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = LocalEmbedder::new(dir.path().to_string_lossy());
        let err = embedder.embed(&["hello".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ModelLoad(_)));
        assert!(embedder.dimension().is_none());
    }

    #[tokio::test]
    async fn empty_batch_skips_model_load() {
        let embedder = LocalEmbedder::new("/nonexistent/model");
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
    }
}
