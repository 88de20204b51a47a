//! Retrieval queries, report listings, and stats

use crate::validate::validate_objective;
use intelscout_core::{Conversation, IntelScoutError, Message, MissionLog, Result};
use intelscout_rag::RagQueryService;
use intelscout_storage::{MissionStats, RelationalLog};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Inbound retrieval query
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query: String,
    pub conversation_id: Option<i64>,
    pub mission_id: Option<i64>,
}

/// Retrieval query response
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub conversation_id: i64,
    pub response: String,
    pub sources: Vec<String>,
    pub status: String,
}

/// Conversation-scoped Q&A over the accumulated memory.
#[derive(Clone)]
pub struct QueryService {
    rag: Arc<RagQueryService>,
    log: RelationalLog,
}

impl QueryService {
    pub fn new(rag: Arc<RagQueryService>, log: RelationalLog) -> Self {
        Self { rag, log }
    }

    /// Answer a follow-up question. The conversation scope comes from the
    /// request directly or is resolved via the referenced mission.
    pub async fn ask(&self, request: QueryRequest) -> Result<QueryResponse> {
        validate_objective(&request.query)?;
        let conversation_id = self.resolve_conversation(&request)?;

        let answer = self.rag.ask(&request.query, conversation_id).await?;
        debug!(conversation_id, sources = answer.sources.len(), "query answered");

        Ok(QueryResponse {
            query: request.query,
            conversation_id,
            response: answer.answer,
            sources: answer.sources,
            status: "complete".to_string(),
        })
    }

    fn resolve_conversation(&self, request: &QueryRequest) -> Result<i64> {
        if let Some(id) = request.conversation_id {
            return Ok(id);
        }
        if let Some(mission_id) = request.mission_id {
            let mission = self.log.get_mission(mission_id)?.ok_or_else(|| {
                IntelScoutError::InvalidInput {
                    message: format!("unknown mission {mission_id}"),
                }
            })?;
            return Ok(mission.conversation_id);
        }
        Err(IntelScoutError::InvalidInput {
            message: "conversation_id or mission_id is required".to_string(),
        })
    }
}

/// Report listings and aggregate stats over the relational log.
#[derive(Clone)]
pub struct ReportService {
    log: RelationalLog,
}

impl ReportService {
    pub fn new(log: RelationalLog) -> Self {
        Self { log }
    }

    /// All mission logs, newest first.
    pub fn list(&self) -> Result<Vec<MissionLog>> {
        self.log.list_reports()
    }

    pub fn stats(&self) -> Result<MissionStats> {
        self.log.stats()
    }

    /// Conversations, most recently active first.
    pub fn conversations(&self) -> Result<Vec<Conversation>> {
        self.log.list_conversations()
    }

    /// Message history for one conversation, oldest first.
    pub fn messages(&self, conversation_id: i64) -> Result<Vec<Message>> {
        self.log.list_messages(conversation_id)
    }
}
