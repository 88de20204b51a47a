//! Retrieval-augmented question answering over the accumulated memory

use crate::embeddings::EmbeddingModel;
use crate::vector::VectorStore;
use intelscout_core::Result;
use intelscout_providers::{CompletionRequest, ProviderInstance};
use std::sync::Arc;
use tracing::{debug, info};

/// Number of chunks retrieved per question.
pub const RAG_TOP_K: usize = 7;

/// Fixed answer when the conversation has no retrievable context.
pub const NO_CONTEXT_ANSWER: &str =
    "No relevant context was found for this conversation yet. Run a research mission first.";

/// Separator between retrieved documents in the synthesis context.
const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Answer plus the distinct report titles it drew from.
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<String>,
}

/// Conversation-scoped question answering: embed, retrieve, synthesize.
pub struct RagQueryService {
    embedder: Arc<dyn EmbeddingModel>,
    store: Arc<VectorStore>,
    provider: Arc<dyn ProviderInstance>,
}

impl RagQueryService {
    pub fn new(
        embedder: Arc<dyn EmbeddingModel>,
        store: Arc<VectorStore>,
        provider: Arc<dyn ProviderInstance>,
    ) -> Self {
        Self {
            embedder,
            store,
            provider,
        }
    }

    /// Answer a question from the conversation's memory. Embedding or
    /// vector-store failure propagates; the caller surfaces it as a
    /// retrieval outage rather than a service crash.
    pub async fn ask(&self, question: &str, conversation_id: i64) -> Result<RagAnswer> {
        let embeddings = self.embedder.embed(&[question.to_string()]).await?;
        let query_vector = embeddings.into_iter().next().unwrap_or_default();

        let matches = self
            .store
            .query(&query_vector, RAG_TOP_K, Some(conversation_id))
            .await?;

        if matches.is_empty() {
            debug!(conversation_id, "no context found for question");
            return Ok(RagAnswer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let context = matches
            .iter()
            .map(|m| m.document.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        let mut sources = Vec::new();
        for m in &matches {
            if let Some(title) = m.metadata.get("title").and_then(|v| v.as_str()) {
                if !sources.iter().any(|s| s == title) {
                    sources.push(title.to_string());
                }
            }
        }

        let prompt =
            format!("Based on this context, answer: {question}\n\nCONTEXT:\n{context}");
        let answer = self
            .provider
            .complete(&CompletionRequest::new(prompt))
            .await?;

        info!(
            conversation_id,
            retrieved = matches.len(),
            sources = sources.len(),
            "rag query answered"
        );
        Ok(RagAnswer { answer, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedding;
    use crate::ingestion::IngestionPipeline;
    use crate::ChunkingConfig;
    use async_trait::async_trait;
    use intelscout_providers::ProviderCapabilities;

    struct EchoProvider {
        capabilities: ProviderCapabilities,
    }

    impl EchoProvider {
        fn new() -> Self {
            Self {
                capabilities: ProviderCapabilities {
                    max_payload_bytes: 64 * 1024,
                    supports_model_discovery: false,
                },
            }
        }
    }

    #[async_trait]
    impl ProviderInstance for EchoProvider {
        fn capabilities(&self) -> &ProviderCapabilities {
            &self.capabilities
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            Ok(format!("ANSWER<{}>", request.prompt))
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }
    }

    async fn seeded_service() -> (RagQueryService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(VectorStore::open(dir.path(), 64).await.unwrap());
        let embedder = Arc::new(HashEmbedding::new(64));
        let pipeline = IngestionPipeline::new(
            ChunkingConfig::default(),
            embedder.clone(),
            Arc::clone(&store),
        );
        pipeline
            .ingest(7, "H100 pricing report", "The H100 sells for $30,000 per unit.")
            .await
            .unwrap();
        pipeline
            .ingest(8, "Other conversation report", "The H100 sells for $99,999.")
            .await
            .unwrap();

        let service = RagQueryService::new(embedder, store, Arc::new(EchoProvider::new()));
        (service, dir)
    }

    #[tokio::test]
    async fn test_ask_scoped_to_conversation() {
        let (service, _dir) = seeded_service().await;
        let result = service.ask("What was the H100 price?", 7).await.unwrap();

        assert!(result.answer.contains("$30,000"));
        assert!(!result.answer.contains("$99,999"));
        assert_eq!(result.sources, vec!["H100 pricing report".to_string()]);
    }

    #[tokio::test]
    async fn test_ask_prompt_shape() {
        let (service, _dir) = seeded_service().await;
        let result = service.ask("What was the H100 price?", 7).await.unwrap();
        assert!(result
            .answer
            .starts_with("ANSWER<Based on this context, answer: What was the H100 price?"));
        assert!(result.answer.contains("CONTEXT:"));
    }

    #[tokio::test]
    async fn test_no_context_answer() {
        let (service, _dir) = seeded_service().await;
        let result = service.ask("anything", 999).await.unwrap();
        assert_eq!(result.answer, NO_CONTEXT_ANSWER);
        assert!(result.sources.is_empty());
    }
}
