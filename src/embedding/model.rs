//! Embedding model seam
//!
//! The engine talks to embedding models through the [`EmbeddingModel`]
//! trait: fastembed (ONNX Runtime) in production behind the `embeddings`
//! feature, a deterministic hashing model as the always-available fallback,
//! and mocks in tests. Model metadata drives the cache-compatibility gate
//! in persistence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from embedding generation and storage
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding returned no results")]
    EmptyResult,

    #[error("embedding model error: {0}")]
    Model(String),

    #[error("embedding produced a non-finite component")]
    NonFinite,

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding timed out: {operation}")]
    Timeout { operation: String },
}

/// Identity and shape of the active embedding model
///
/// `dimensions` is the compatibility predicate for persisted caches: a
/// cache written under one model loads under another iff the dimensions
/// are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub repo: String,
    pub dimensions: usize,
}

/// Trait for embedding text into fixed-length vectors
///
/// Calls may be CPU- or GPU-bound; implementations must not block the
/// async executor (wrap blocking inference in `spawn_blocking`).
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed a batch of texts, returning one vector per text, aligned.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::EmptyResult)
    }

    /// Model metadata (id, repository, vector length).
    fn info(&self) -> ModelInfo;
}

// ---------------------------------------------------------------------------
// HashingModel — deterministic fallback
// ---------------------------------------------------------------------------

/// Deterministic feature-hashing model
///
/// Buckets character trigrams into a fixed-length vector with FNV-1a and
/// L2-normalizes the result. Not semantically meaningful, but stable across
/// runs, so every retrieval and persistence path works without an ONNX
/// runtime.
pub struct HashingModel {
    dimensions: usize,
}

impl HashingModel {
    pub const DEFAULT_DIMENSIONS: usize = 384;

    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return vector;
        }
        for window in chars.windows(3.min(chars.len())) {
            let mut hash: u64 = 0xcbf29ce484222325;
            for c in window {
                for byte in (*c as u32).to_le_bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(0x100000001b3);
                }
            }
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashingModel {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingModel for HashingModel {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            id: format!("hashing-trigram-{}", self.dimensions),
            repo: "builtin".to_string(),
            dimensions: self.dimensions,
        }
    }
}

// ---------------------------------------------------------------------------
// FastEmbedModel — production model behind `embeddings` feature
// ---------------------------------------------------------------------------

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use super::{EmbeddingError, EmbeddingModel, ModelInfo};
    use async_trait::async_trait;
    use fastembed::{InitOptions, TextEmbedding};
    use std::sync::{Arc, Mutex};

    /// Production model backed by fastembed (ONNX Runtime).
    ///
    /// `TextEmbedding::embed` requires `&mut self`, so the model sits behind
    /// an `Arc<Mutex<_>>` and inference runs on the blocking pool.
    pub struct FastEmbedModel {
        inner: Arc<Mutex<TextEmbedding>>,
        info: ModelInfo,
    }

    impl FastEmbedModel {
        /// Load a specific fastembed model.
        pub fn new(model: fastembed::EmbeddingModel) -> Result<Self, EmbeddingError> {
            let descriptor = TextEmbedding::list_supported_models()
                .into_iter()
                .find(|m| m.model == model)
                .ok_or_else(|| EmbeddingError::Model(format!("unsupported model {:?}", model)))?;

            let options = InitOptions::new(model).with_show_download_progress(false);
            let embedding = TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::Model(e.to_string()))?;

            Ok(Self {
                inner: Arc::new(Mutex::new(embedding)),
                info: ModelInfo {
                    id: descriptor.model_code.clone(),
                    repo: descriptor.model_code,
                    dimensions: descriptor.dim,
                },
            })
        }

        /// Load the default model (nomic-embed-text-v1.5).
        pub fn default_model() -> Result<Self, EmbeddingError> {
            Self::new(fastembed::EmbeddingModel::NomicEmbedTextV15)
        }
    }

    #[async_trait]
    impl EmbeddingModel for FastEmbedModel {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let inner = self.inner.clone();
            let texts = texts.to_vec();
            let vectors = tokio::task::spawn_blocking(move || {
                let mut model = inner.lock().unwrap();
                model.embed(texts, None)
            })
            .await
            .map_err(|e| EmbeddingError::Model(e.to_string()))?
            .map_err(|e| EmbeddingError::Model(e.to_string()))?;

            if vectors.is_empty() {
                return Err(EmbeddingError::EmptyResult);
            }
            Ok(vectors)
        }

        fn info(&self) -> ModelInfo {
            self.info.clone()
        }
    }
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedModel;
