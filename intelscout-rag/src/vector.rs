//! Persistent vector collection with conversation-scoped retrieval
//!
//! One process-wide collection holds all chunks across conversations;
//! isolation is enforced at query time by filtering on `conversation_id`.
//! A dimension mismatch destroys and recreates the collection (the
//! relational log keeps the canonical report text, so the index is
//! rebuildable), with the heal path serialized behind the state mutex so
//! concurrent mismatched writes reset exactly once.

use intelscout_core::{IntelScoutError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Canonical collection name; bump the suffix on breaking layout changes.
pub const COLLECTION_NAME: &str = "document_store_v2";

/// One retrieval hit.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: String,
    pub document: String,
    /// Cosine distance; lower is closer.
    pub distance: f32,
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    embedding: Vec<f32>,
    document: String,
    metadata: HashMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Collection {
    dimension: usize,
    records: Vec<StoredRecord>,
}

/// The vector store adapter.
pub struct VectorStore {
    path: PathBuf,
    state: Mutex<Collection>,
    resets: AtomicU32,
}

impl VectorStore {
    /// Open (or create) the collection under `dir` with dimension D. A
    /// persisted collection of a different dimension is destroyed and
    /// recreated empty.
    pub async fn open(dir: &Path, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| IntelScoutError::VectorStore {
            message: format!("failed to create vector dir '{}'", dir.display()),
            source: Some(Box::new(e)),
        })?;
        let path = dir.join(format!("{COLLECTION_NAME}.mpk"));

        let mut resets = 0;
        let collection = match Self::load(&path)? {
            Some(existing) if existing.dimension == dimension => existing,
            Some(existing) => {
                warn!(
                    persisted = existing.dimension,
                    configured = dimension,
                    "vector collection dimension mismatch at open, recreating empty collection"
                );
                resets = 1;
                let fresh = Collection {
                    dimension,
                    records: Vec::new(),
                };
                Self::save(&path, &fresh)?;
                fresh
            }
            None => {
                let fresh = Collection {
                    dimension,
                    records: Vec::new(),
                };
                Self::save(&path, &fresh)?;
                fresh
            }
        };

        Ok(Self {
            path,
            state: Mutex::new(collection),
            resets: AtomicU32::new(resets),
        })
    }

    fn load(path: &Path) -> Result<Option<Collection>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(path).map_err(|e| IntelScoutError::VectorStore {
            message: format!("failed to read collection '{}'", path.display()),
            source: Some(Box::new(e)),
        })?;
        match rmp_serde::from_slice(&bytes) {
            Ok(collection) => Ok(Some(collection)),
            Err(e) => {
                // A corrupt index is treated like a mismatch: rebuildable
                warn!(error = %e, "vector collection unreadable, will recreate");
                Ok(None)
            }
        }
    }

    fn save(path: &Path, collection: &Collection) -> Result<()> {
        let bytes =
            rmp_serde::to_vec(collection).map_err(|e| IntelScoutError::VectorStore {
                message: "failed to serialize collection".to_string(),
                source: Some(Box::new(e)),
            })?;
        std::fs::write(path, bytes).map_err(|e| IntelScoutError::VectorStore {
            message: format!("failed to persist collection '{}'", path.display()),
            source: Some(Box::new(e)),
        })
    }

    /// Destroy and recreate the collection with `dimension`, under an
    /// already-held state lock.
    fn heal(&self, state: &mut Collection, dimension: usize) -> Result<()> {
        warn!(
            old_dimension = state.dimension,
            new_dimension = dimension,
            dropped_records = state.records.len(),
            "dimension mismatch: destroying and recreating vector collection"
        );
        state.dimension = dimension;
        state.records.clear();
        self.resets.fetch_add(1, Ordering::SeqCst);
        Self::save(&self.path, state)
    }

    /// Upsert a batch. IDs derived from `(title, ordinal)` make
    /// re-ingestion idempotent. A dimension mismatch triggers the self-heal
    /// and the write is retried once against the fresh collection.
    pub async fn add(
        &self,
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        documents: Vec<String>,
        metadatas: Vec<HashMap<String, Value>>,
    ) -> Result<()> {
        if ids.len() != embeddings.len()
            || ids.len() != documents.len()
            || ids.len() != metadatas.len()
        {
            return Err(IntelScoutError::VectorStore {
                message: "add() called with mismatched batch lengths".to_string(),
                source: None,
            });
        }
        if ids.is_empty() {
            return Ok(());
        }

        let incoming_dim = embeddings[0].len();
        if embeddings.iter().any(|e| e.len() != incoming_dim) {
            return Err(IntelScoutError::VectorStore {
                message: "add() batch contains vectors of differing dimensions".to_string(),
                source: None,
            });
        }

        let mut state = self.state.lock().await;
        if incoming_dim != state.dimension {
            self.heal(&mut state, incoming_dim)?;
        }

        for (((id, embedding), document), metadata) in ids
            .into_iter()
            .zip(embeddings)
            .zip(documents)
            .zip(metadatas)
        {
            state.records.retain(|r| r.id != id);
            state.records.push(StoredRecord {
                id,
                embedding,
                document,
                metadata,
            });
        }
        Self::save(&self.path, &state)?;
        debug!(total = state.records.len(), "vector batch stored");
        Ok(())
    }

    /// Nearest neighbours by cosine distance, restricted to one
    /// conversation when a filter is given.
    pub async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        conversation_id: Option<i64>,
    ) -> Result<Vec<QueryMatch>> {
        let mut state = self.state.lock().await;
        if embedding.len() != state.dimension {
            // Retry-once semantics: after the heal the collection is empty,
            // so the retried query trivially succeeds with no hits.
            self.heal(&mut state, embedding.len())?;
            return Ok(Vec::new());
        }

        let mut matches: Vec<QueryMatch> = state
            .records
            .iter()
            .filter(|record| match conversation_id {
                Some(id) => record
                    .metadata
                    .get("conversation_id")
                    .and_then(Value::as_i64)
                    == Some(id),
                None => true,
            })
            .map(|record| QueryMatch {
                id: record.id.clone(),
                document: record.document.clone(),
                distance: cosine_distance(embedding, &record.embedding),
                metadata: record.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(top_k);
        Ok(matches)
    }

    /// Destroy all records, keeping the current dimension.
    pub async fn reset(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let dimension = state.dimension;
        self.heal(&mut state, dimension)
    }

    pub async fn count(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn dimension(&self) -> usize {
        self.state.lock().await.dimension
    }

    /// How many times the collection has been destroyed and recreated.
    pub fn reset_count(&self) -> u32 {
        self.resets.load(Ordering::SeqCst)
    }

    /// Liveness probe for health checks: the backing file's directory must
    /// still exist and the state lock must be reachable.
    pub async fn ping(&self) -> Result<()> {
        let _ = self.state.lock().await;
        match self.path.parent() {
            Some(parent) if parent.exists() => Ok(()),
            _ => Err(IntelScoutError::VectorStore {
                message: "vector store directory missing".to_string(),
                source: None,
            }),
        }
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}
