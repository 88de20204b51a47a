//! Document ingestion: chunk, embed, store
//!
//! Used synchronously when a mission persists its report, and as the
//! fire-and-forget target for scraped page content. Embedding failure is
//! fatal for the ingestion attempt; the caller decides whether that is a
//! warning (mission persistence) or an error.

use crate::chunking::{chunk_text, ChunkingConfig};
use crate::embeddings::EmbeddingModel;
use crate::vector::VectorStore;
use chrono::Utc;
use intelscout_core::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Chunk → embed → add pipeline over the shared vector store.
#[derive(Clone)]
pub struct IngestionPipeline {
    chunking: ChunkingConfig,
    embedder: Arc<dyn EmbeddingModel>,
    store: Arc<VectorStore>,
}

impl IngestionPipeline {
    pub fn new(
        chunking: ChunkingConfig,
        embedder: Arc<dyn EmbeddingModel>,
        store: Arc<VectorStore>,
    ) -> Self {
        Self {
            chunking,
            embedder,
            store,
        }
    }

    /// Ingest one document under a conversation. Chunk IDs derive from
    /// `(title, ordinal)`, so re-ingesting the same titled document is
    /// idempotent. Returns the number of chunks written.
    pub async fn ingest(&self, conversation_id: i64, title: &str, text: &str) -> Result<usize> {
        let chunks = chunk_text(text, &self.chunking);
        if chunks.is_empty() {
            debug!(conversation_id, title, "nothing to ingest");
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        let timestamp = Utc::now().to_rfc3339();
        let mut ids = Vec::with_capacity(chunks.len());
        let mut metadatas: Vec<HashMap<String, Value>> = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            ids.push(format!("{title}-{}", chunk.ordinal));
            metadatas.push(HashMap::from([
                ("conversation_id".to_string(), json!(conversation_id)),
                ("title".to_string(), json!(title)),
                ("timestamp".to_string(), json!(timestamp)),
            ]));
        }

        let count = ids.len();
        self.store.add(ids, embeddings, texts, metadatas).await?;
        info!(conversation_id, title, chunks = count, "document ingested");
        Ok(count)
    }
}
