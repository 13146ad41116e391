//! Dense-vector sidecar: model seam, store, and description text.

pub mod model;
pub mod store;
pub mod text;

pub use model::{EmbeddingError, EmbeddingModel, HashingModel, ModelInfo};
pub use store::{EmbeddingRecord, EmbeddingStore};
pub use text::{describe_node, MAX_EMBED_CHARS};

#[cfg(feature = "embeddings")]
pub use model::FastEmbedModel;
