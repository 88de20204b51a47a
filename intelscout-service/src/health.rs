//! Health probes for the orchestrator

use chrono::{DateTime, Utc};
use intelscout_rag::VectorStore;
use intelscout_storage::RelationalLog;
use serde::Serialize;
use std::sync::Arc;

/// Full health report: per-subsystem up/down plus server time.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub database: String,
    pub vector_store: String,
    pub server_time: DateTime<Utc>,
}

#[derive(Clone)]
pub struct HealthService {
    log: RelationalLog,
    store: Arc<VectorStore>,
}

impl HealthService {
    pub fn new(log: RelationalLog, store: Arc<VectorStore>) -> Self {
        Self { log, store }
    }

    /// Probe both stores. Degraded rather than failing when one is down,
    /// so the report itself always renders.
    pub async fn check(&self) -> HealthReport {
        let database = if self.log.ping().is_ok() { "up" } else { "down" };
        let vector_store = if self.store.ping().await.is_ok() {
            "up"
        } else {
            "down"
        };
        let status = if database == "up" && vector_store == "up" {
            "ok"
        } else {
            "degraded"
        };
        HealthReport {
            status: status.to_string(),
            database: database.to_string(),
            vector_store: vector_store.to_string(),
            server_time: Utc::now(),
        }
    }

    /// Lightweight readiness probe: the process is wired and can accept
    /// requests.
    pub fn ready(&self) -> bool {
        true
    }
}
