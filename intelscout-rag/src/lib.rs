//! Retrieval-augmented memory for rs-intelscout
//!
//! Chunking, embedding generation, the persistent vector collection with
//! conversation-scoped retrieval, and the question-answering pipeline that
//! reads it back.

pub mod chunking;
pub mod embeddings;
pub mod ingestion;
pub mod query;
pub mod vector;

pub use chunking::{chunk_text, Chunk, ChunkingConfig};
pub use embeddings::{embedding_from_config, EmbeddingModel, HashEmbedding, OpenAiEmbedding};
pub use ingestion::IngestionPipeline;
pub use query::{RagAnswer, RagQueryService, NO_CONTEXT_ANSWER, RAG_TOP_K};
pub use vector::{QueryMatch, VectorStore, COLLECTION_NAME};
