//! Facade-level scenarios: validation, buffered execution, retrieval
//! queries, listings, and health

use async_trait::async_trait;
use intelscout_agents::toolset::{ActionTool, ResearchTool, SearchTool};
use intelscout_agents::Toolset;
use intelscout_core::{IntelScoutError, Result, ToolKind};
use intelscout_events::{CollectingSink, ProgressEvent};
use intelscout_providers::{CompletionRequest, ProviderCapabilities, ProviderInstance};
use intelscout_rag::{HashEmbedding, VectorStore};
use intelscout_service::{AppState, MissionRequest, QueryRequest};
use intelscout_storage::RelationalLog;
use serde_json::Value;
use std::sync::Arc;

const DIM: usize = 64;

/// Provider double: first call returns an unusable plan (forcing the
/// verbatim-search fallback), every later call builds a report from the
/// `$`-bearing lines of its prompt.
struct FallbackEchoProvider {
    capabilities: ProviderCapabilities,
    calls: tokio::sync::Mutex<u32>,
}

impl FallbackEchoProvider {
    fn new() -> Self {
        Self {
            capabilities: ProviderCapabilities {
                max_payload_bytes: 28 * 1024,
                supports_model_discovery: false,
            },
            calls: tokio::sync::Mutex::new(0),
        }
    }
}

#[async_trait]
impl ProviderInstance for FallbackEchoProvider {
    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut calls = self.calls.lock().await;
        *calls += 1;
        if request.prompt.contains("research planner") {
            return Ok("no plan from me".to_string());
        }
        let priced: Vec<&str> = request
            .prompt
            .lines()
            .filter(|l| l.contains('$'))
            .collect();
        if priced.is_empty() {
            Ok("Answer without figures.".to_string())
        } else {
            Ok(format!("Answer citing {}", priced.join(" | ")))
        }
    }

    fn name(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub-1"
    }
}

struct FixedSearch;

#[async_trait]
impl SearchTool for FixedSearch {
    async fn search(&self, _query: &str) -> Result<String> {
        Ok("The H100 lists at $30,000 while refurbished units run $32,500.\n\
            Source: https://market.example.com/h100"
            .to_string())
    }

    async fn search_prices(&self, _product: &str, _year: &str) -> Result<String> {
        Ok("Aggregated price $30,000.\nSource: https://prices.example.com".to_string())
    }
}

struct NoResearch;

#[async_trait]
impl ResearchTool for NoResearch {
    async fn scrape(&self, url: &str, _conversation_id: i64) -> Result<String> {
        Err(IntelScoutError::ScrapeFailed {
            url: url.to_string(),
            message: "unused in these scenarios".to_string(),
        })
    }
}

struct NoActions;

#[async_trait]
impl ActionTool for NoActions {
    async fn dispatch(&self, kind: ToolKind, _args: &Value, _report: &str) -> Result<String> {
        Ok(format!("{kind} ok"))
    }
}

async fn app() -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let log = RelationalLog::open(dir.path().join("svc.db").to_str().unwrap(), 5).unwrap();
    let store = Arc::new(
        VectorStore::open(&dir.path().join("vectors"), DIM)
            .await
            .unwrap(),
    );
    let state = AppState::with_components(
        Arc::new(FallbackEchoProvider::new()),
        Arc::new(HashEmbedding::new(DIM)),
        Toolset::new(Arc::new(FixedSearch), Arc::new(NoResearch), Arc::new(NoActions)),
        log,
        store,
    );
    (state, dir)
}

#[tokio::test]
async fn test_one_char_objective_rejected_without_mission_row() {
    let (state, _dir) = app().await;
    let err = state
        .missions
        .run_buffered(MissionRequest {
            user_input: "X".to_string(),
            conversation_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, IntelScoutError::InvalidInput { .. }));
    assert!(state.reports.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_and_sentinel_objectives_rejected() {
    let (state, _dir) = app().await;
    for bad in [
        "a".repeat(1001),
        "<script>alert('x')</script>".to_string(),
        "x'; DROP TABLE mission_logs; --".to_string(),
    ] {
        let err = state
            .missions
            .run_buffered(MissionRequest {
                user_input: bad,
                conversation_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IntelScoutError::InvalidInput { .. }));
    }
    assert!(state.reports.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_streaming_rejection_emits_single_error_event() {
    let (state, _dir) = app().await;
    let sink = Arc::new(CollectingSink::new());
    let result = state
        .missions
        .run_streaming(
            MissionRequest {
                user_input: String::new(),
                conversation_id: None,
            },
            sink.clone(),
        )
        .await;
    assert!(result.is_err());

    let events = sink.events().await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ProgressEvent::Error { .. }));
}

#[tokio::test]
async fn test_buffered_mission_envelope() {
    let (state, _dir) = app().await;
    let outcome = state
        .missions
        .run_buffered(MissionRequest {
            user_input: "Find NVIDIA H100 GPU pricing 2024".to_string(),
            conversation_id: None,
        })
        .await
        .unwrap();

    assert_eq!(outcome.status, "complete");
    assert!(outcome.mission_id > 0);
    assert!(outcome.report.contains("$30,000"));
    assert!(!outcome.trace.is_empty());
}

#[tokio::test]
async fn test_rag_query_after_mission_is_conversation_scoped() {
    let (state, _dir) = app().await;

    // Mission in conversation A ingests the priced report
    let outcome = state
        .missions
        .run_buffered(MissionRequest {
            user_input: "Find NVIDIA H100 GPU pricing 2024".to_string(),
            conversation_id: None,
        })
        .await
        .unwrap();
    assert_eq!(outcome.status, "complete");

    // Query resolved via mission_id lands in the same conversation
    let answer = state
        .queries
        .ask(QueryRequest {
            query: "What was the H100 price?".to_string(),
            conversation_id: None,
            mission_id: Some(outcome.mission_id),
        })
        .await
        .unwrap();

    assert_eq!(answer.status, "complete");
    assert!(answer.response.contains("$30,000") || answer.response.contains("$32,500"));
    assert!(answer
        .sources
        .iter()
        .any(|s| s.contains("Find NVIDIA H100 GPU pricing 2024")));

    // A different conversation sees none of it
    let other = state
        .queries
        .ask(QueryRequest {
            query: "What was the H100 price?".to_string(),
            conversation_id: Some(9_999),
            mission_id: None,
        })
        .await
        .unwrap();
    assert!(other.sources.is_empty());
}

#[tokio::test]
async fn test_query_requires_some_scope() {
    let (state, _dir) = app().await;
    let err = state
        .queries
        .ask(QueryRequest {
            query: "anything at all".to_string(),
            conversation_id: None,
            mission_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, IntelScoutError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_reports_listing_and_stats() {
    let (state, _dir) = app().await;
    for objective in ["Find NVIDIA H100 GPU pricing 2024", "Summarize AMD MI300 specs"] {
        state
            .missions
            .run_buffered(MissionRequest {
                user_input: objective.to_string(),
                conversation_id: None,
            })
            .await
            .unwrap();
    }

    let reports = state.reports.list().unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports[0].created_at >= reports[1].created_at);

    let stats = state.reports.stats().unwrap();
    assert_eq!(stats.total_missions, 2);
    assert_eq!(stats.completed_missions, 2);
    assert_eq!(stats.failed_missions, 0);
}

#[tokio::test]
async fn test_health_reports_ok() {
    let (state, _dir) = app().await;
    let report = state.health.check().await;
    assert_eq!(report.status, "ok");
    assert_eq!(report.database, "up");
    assert_eq!(report.vector_store, "up");
    assert!(state.health.ready());
}

#[tokio::test]
async fn test_streaming_mission_ndjson_shape() {
    let (state, _dir) = app().await;
    let (sink, mut rx) = intelscout_events::ChannelSink::new(64);

    let missions = state.missions.clone();
    let task = tokio::spawn(async move {
        missions
            .run_streaming(
                MissionRequest {
                    user_input: "Find NVIDIA H100 GPU pricing 2024".to_string(),
                    conversation_id: None,
                },
                Arc::new(sink),
            )
            .await
    });

    let mut lines = Vec::new();
    while let Some(event) = rx.recv().await {
        lines.push(event.to_ndjson_line());
    }
    let outcome = task.await.unwrap().unwrap();
    assert_eq!(outcome.status, intelscout_core::MissionStatus::Completed);

    // Every line is one standalone JSON object; the last is terminal
    for line in &lines {
        let value: Value = serde_json::from_str(line.trim()).unwrap();
        assert!(value.get("type").is_some());
    }
    let last: Value = serde_json::from_str(lines.last().unwrap().trim()).unwrap();
    assert_eq!(last["type"], "complete");
}
