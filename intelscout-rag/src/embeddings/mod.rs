//! Embedding providers
//!
//! All vectors produced within one process share the fixed dimension D;
//! mixing models of different dimensions is a programming error the vector
//! store guards against with its self-heal path.

mod hash;
mod openai;

pub use hash::HashEmbedding;
pub use openai::OpenAiEmbedding;

use async_trait::async_trait;
use intelscout_config::EmbeddingConfig;
use intelscout_core::Result;
use std::sync::Arc;

/// Trait for embedding model implementations
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Generate embeddings for a batch of texts, one vector per input, in
    /// input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Vector dimension produced by this model
    fn dimensions(&self) -> usize;

    /// Model identifier
    fn model_id(&self) -> &str;
}

/// Build the configured embedding model. `"hash"` selects the deterministic
/// local fallback, anything else the remote provider.
pub fn embedding_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingModel>> {
    if config.model_name == "hash" {
        Ok(Arc::new(HashEmbedding::new(config.dimensions)))
    } else {
        Ok(Arc::new(OpenAiEmbedding::from_config(config)?))
    }
}
