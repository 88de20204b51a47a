//! Mission execution state machine
//!
//! IDLE → PLANNING → RESEARCHING → SYNTHESIZING → ACTING → PERSISTING →
//! DONE, with FAILED reachable from the research/synthesis path and from
//! persistence. Tool-level failures are recorded in the trace and skipped;
//! synthesis failure, planner-total-failure after fallback, and
//! cancellation fail the mission. Cancellation is checked at every
//! transition and before each tool dispatch.

use crate::curator::{is_price_bearing, IntelCurator};
use crate::planner::Planner;
use crate::toolset::Toolset;
use chrono::{Datelike, Utc};
use intelscout_core::types::{truncate_chars, TITLE_TRUNCATE_CHARS};
use intelscout_core::{
    IntelRecord, IntelScoutError, MessageRole, MissionStatus, Plan, PlanStep, Result, ToolKind,
    TraceEntry,
};
use intelscout_events::{ProgressEvent, ProgressStreamer};
use intelscout_providers::{CompletionRequest, ProviderInstance};
use intelscout_rag::IngestionPipeline;
use intelscout_storage::RelationalLog;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Trace summaries and tool-complete events carry at most this many chars.
const SUMMARY_CHARS: usize = 140;

static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").expect("static pattern"));

/// Words stripped when deriving a product name from a price objective.
static PRODUCT_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(find|get|what|is|are|the|a|an|of|for|in|on|how|much|does|do|current|latest|pric\w*|cost\w*|msrp|20\d{2})$")
        .expect("static pattern")
});

/// Final state of a mission attempt, as returned by the buffered interface.
#[derive(Debug, Clone)]
pub struct MissionOutcome {
    pub mission_id: i64,
    pub conversation_id: i64,
    pub status: MissionStatus,
    pub report: String,
    pub trace: Vec<TraceEntry>,
}

pub struct MissionExecutor {
    provider: Arc<dyn ProviderInstance>,
    planner: Planner,
    tools: Toolset,
    log: RelationalLog,
    ingestion: IngestionPipeline,
}

impl MissionExecutor {
    pub fn new(
        provider: Arc<dyn ProviderInstance>,
        tools: Toolset,
        log: RelationalLog,
        ingestion: IngestionPipeline,
    ) -> Self {
        Self {
            planner: Planner::new(Arc::clone(&provider)),
            provider,
            tools,
            log,
            ingestion,
        }
    }

    /// Run one mission, emitting progress through the streamer and
    /// persisting the outcome. Always returns an outcome; failures are
    /// reported through it and through the terminal `error` event.
    pub async fn run(
        &self,
        objective: &str,
        conversation_id: Option<i64>,
        streamer: &ProgressStreamer,
    ) -> MissionOutcome {
        let (conversation_id, mission_id) = match self.setup(objective, conversation_id) {
            Ok(ids) => ids,
            Err(e) => {
                streamer.emit_error(&e, Some("mission setup".to_string())).await;
                return MissionOutcome {
                    mission_id: 0,
                    conversation_id: conversation_id.unwrap_or(0),
                    status: MissionStatus::Failed,
                    report: e.to_string(),
                    trace: Vec::new(),
                };
            }
        };

        let mut trace = Vec::new();
        let result = self
            .execute(objective, conversation_id, streamer, &mut trace)
            .await
            .and_then(|report| {
                // PERSISTING: a cancel arriving during ACTING still wins
                ensure_not_cancelled(streamer)?;
                self.log.complete_mission(mission_id, &report)?;
                Ok(report)
            });

        match result {
            Ok(report) => {
                if let Err(e) =
                    self.log
                        .append_message(conversation_id, MessageRole::Assistant, &report)
                {
                    warn!(mission_id, error = %e, "failed to append assistant message");
                }
                if let Err(e) = self.log.touch_conversation(conversation_id) {
                    warn!(mission_id, error = %e, "failed to touch conversation");
                }

                // The vector index is best-effort; the relational log is
                // the authoritative copy and re-ingestion can repair it.
                let title = truncate_chars(objective, TITLE_TRUNCATE_CHARS);
                if let Err(e) = self.ingestion.ingest(conversation_id, &title, &report).await {
                    warn!(mission_id, error = %e, "report persisted but not indexed");
                }

                info!(mission_id, conversation_id, "mission completed");
                streamer.emit_complete(report.clone()).await;
                MissionOutcome {
                    mission_id,
                    conversation_id,
                    status: MissionStatus::Completed,
                    report,
                    trace,
                }
            }
            Err(e) => {
                if let Err(log_err) = self.log.fail_mission(mission_id, &e.to_string()) {
                    warn!(mission_id, error = %log_err, "failed to record mission failure");
                }
                info!(mission_id, conversation_id, error = %e, "mission failed");
                streamer.emit_error(&e, Some(format!("mission {mission_id}"))).await;
                MissionOutcome {
                    mission_id,
                    conversation_id,
                    status: MissionStatus::Failed,
                    report: e.to_string(),
                    trace,
                }
            }
        }
    }

    /// Conversation row, user message, and the PENDING → IN_PROGRESS
    /// mission row.
    fn setup(&self, objective: &str, conversation_id: Option<i64>) -> Result<(i64, i64)> {
        let conversation = self.log.ensure_conversation(conversation_id, objective)?;
        if let Err(e) = self
            .log
            .append_message(conversation.id, MessageRole::User, objective)
        {
            warn!(conversation_id = conversation.id, error = %e, "failed to append user message");
        }
        let mission = self.log.create_mission(conversation.id, objective)?;
        self.log.mark_mission_running(mission.id)?;
        Ok((conversation.id, mission.id))
    }

    /// PLANNING → RESEARCHING → SYNTHESIZING → ACTING.
    async fn execute(
        &self,
        objective: &str,
        conversation_id: i64,
        streamer: &ProgressStreamer,
        trace: &mut Vec<TraceEntry>,
    ) -> Result<String> {
        // PLANNING
        ensure_not_cancelled(streamer)?;
        streamer
            .emit(ProgressEvent::Thinking {
                content: format!("Planning research mission: {objective}"),
            })
            .await;
        let mut plan = self.planner.plan(objective).await;
        if plan.is_empty() {
            warn!("planner produced no usable steps, falling back to verbatim search");
            plan = Plan::fallback_search(objective);
        }
        streamer
            .emit(ProgressEvent::Thinking {
                content: format!("Executing a {}-step plan", plan.len()),
            })
            .await;

        // RESEARCHING
        let mut curator = IntelCurator::new(self.provider.capabilities().max_payload_bytes);
        let research: Vec<&PlanStep> = plan.research_steps().collect();
        let total = research.len();
        for (index, step) in research.iter().enumerate() {
            ensure_not_cancelled(streamer)?;
            self.run_research_step(step, objective, conversation_id, streamer, trace, &mut curator)
                .await;
            streamer.emit(ProgressEvent::progress(index + 1, total)).await;
        }

        // Price-mission top-up: a pricing objective with no price-bearing
        // evidence yet gets one extra fan-out before synthesis.
        if is_price_bearing(objective) && !curator.has_price_evidence() {
            ensure_not_cancelled(streamer)?;
            self.run_price_topup(objective, streamer, trace, &mut curator).await;
        }

        // SYNTHESIZING
        ensure_not_cancelled(streamer)?;
        streamer
            .emit(ProgressEvent::Thinking {
                content: format!("Synthesizing report from {} evidence records", curator.len()),
            })
            .await;
        let report = self.synthesize(objective, &curator).await?;

        // ACTING
        for step in plan.action_steps() {
            ensure_not_cancelled(streamer)?;
            self.run_action_step(step, &report, streamer, trace).await;
        }

        Ok(report)
    }

    async fn run_research_step(
        &self,
        step: &PlanStep,
        objective: &str,
        conversation_id: i64,
        streamer: &ProgressStreamer,
        trace: &mut Vec<TraceEntry>,
        curator: &mut IntelCurator,
    ) {
        let tool = step.tool;
        streamer
            .emit(ProgressEvent::ToolStart {
                tool: tool.to_string(),
                args: step.args.clone(),
            })
            .await;

        let (origin, result) = match tool {
            ToolKind::WebSearch => {
                let query = step
                    .args
                    .get("query")
                    .and_then(Value::as_str)
                    .unwrap_or(objective);
                (query.to_string(), self.tools.search.search(query).await)
            }
            ToolKind::WebResearch => match step.args.get("url").and_then(Value::as_str) {
                Some(url) => (
                    url.to_string(),
                    self.tools.research.scrape(url, conversation_id).await,
                ),
                None => (
                    String::new(),
                    Err(IntelScoutError::ScrapeFailed {
                        url: String::new(),
                        message: "plan step has no url argument".to_string(),
                    }),
                ),
            },
            // Action tools never appear in the research phase
            ToolKind::SaveToNotion | ToolKind::DispatchEmail => return,
        };

        match result {
            Ok(content) => {
                let summary = summarize(&content);
                curator.append(IntelRecord::new(tool, origin, content));
                trace.push(TraceEntry::ok(tool.as_str(), &summary));
                streamer
                    .emit(ProgressEvent::ToolComplete {
                        tool: tool.to_string(),
                        summary,
                        error: None,
                    })
                    .await;
            }
            Err(e) => {
                warn!(tool = %tool, error = %e, "research step failed, continuing");
                trace.push(TraceEntry::error(tool.as_str(), e.to_string()));
                streamer
                    .emit(ProgressEvent::ToolComplete {
                        tool: tool.to_string(),
                        summary: String::new(),
                        error: Some(e.to_string()),
                    })
                    .await;
            }
        }
    }

    async fn run_price_topup(
        &self,
        objective: &str,
        streamer: &ProgressStreamer,
        trace: &mut Vec<TraceEntry>,
        curator: &mut IntelCurator,
    ) {
        let product = extract_product(objective);
        let year = extract_year(objective)
            .unwrap_or_else(|| Utc::now().year().to_string());
        debug!(product = product.as_str(), year = year.as_str(), "running price top-up");

        streamer
            .emit(ProgressEvent::ToolStart {
                tool: ToolKind::WebSearch.to_string(),
                args: json!({ "product": product, "year": year, "mode": "prices" }),
            })
            .await;

        match self.tools.search.search_prices(&product, &year).await {
            Ok(content) => {
                let summary = summarize(&content);
                curator.append(IntelRecord::new(
                    ToolKind::WebSearch,
                    format!("price_search:{product}"),
                    content,
                ));
                trace.push(TraceEntry::ok(ToolKind::WebSearch.as_str(), &summary));
                streamer
                    .emit(ProgressEvent::ToolComplete {
                        tool: ToolKind::WebSearch.to_string(),
                        summary,
                        error: None,
                    })
                    .await;
            }
            Err(e) => {
                warn!(error = %e, "price top-up failed, continuing");
                trace.push(TraceEntry::error(ToolKind::WebSearch.as_str(), e.to_string()));
                streamer
                    .emit(ProgressEvent::ToolComplete {
                        tool: ToolKind::WebSearch.to_string(),
                        summary: String::new(),
                        error: Some(e.to_string()),
                    })
                    .await;
            }
        }
    }

    /// One synthesis call; on `PayloadTooLarge` the pool is re-materialized
    /// under a tightened budget and the call retried once.
    async fn synthesize(&self, objective: &str, curator: &IntelCurator) -> Result<String> {
        let request = CompletionRequest::new(synthesis_prompt(objective, &curator.materialize()));
        match self.provider.complete(&request).await {
            Ok(report) => Ok(report),
            Err(IntelScoutError::PayloadTooLarge { actual, limit }) => {
                warn!(actual, limit, "synthesis payload over budget, tightening pool");
                let request =
                    CompletionRequest::new(synthesis_prompt(objective, &curator.materialize_tight()));
                self.provider.complete(&request).await
            }
            Err(e) => Err(e),
        }
    }

    async fn run_action_step(
        &self,
        step: &PlanStep,
        report: &str,
        streamer: &ProgressStreamer,
        trace: &mut Vec<TraceEntry>,
    ) {
        let action = step.tool;
        let title = step
            .args
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Research Report")
            .to_string();
        streamer
            .emit(ProgressEvent::ActionStart {
                action: action.to_string(),
                title,
            })
            .await;

        match self.tools.actions.dispatch(action, &step.args, report).await {
            Ok(result_text) => {
                trace.push(TraceEntry::ok(action.as_str(), &result_text));
                streamer
                    .emit(ProgressEvent::ActionComplete {
                        action: action.to_string(),
                        result: result_text,
                        error: None,
                    })
                    .await;
            }
            Err(e) => {
                warn!(action = %action, error = %e, "action failed, mission continues");
                trace.push(TraceEntry::error(action.as_str(), e.to_string()));
                streamer
                    .emit(ProgressEvent::ActionComplete {
                        action: action.to_string(),
                        result: String::new(),
                        error: Some(e.to_string()),
                    })
                    .await;
            }
        }
    }
}

fn ensure_not_cancelled(streamer: &ProgressStreamer) -> Result<()> {
    if streamer.is_cancelled() {
        Err(IntelScoutError::Cancelled {
            reason: "cancelled".to_string(),
        })
    } else {
        Ok(())
    }
}

fn synthesis_prompt(objective: &str, intel: &str) -> String {
    format!(
        "You are a market intelligence analyst. Using only the evidence \
         below, write a structured report answering the objective. Cite the \
         source URL for every claim and include every concrete price figure \
         found in the evidence.\n\nOBJECTIVE: {objective}\n\nEVIDENCE:\n{intel}"
    )
}

/// First line-ish of a tool result, for trace entries and events.
fn summarize(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&flat, SUMMARY_CHARS)
}

/// Year mentioned in the objective, if any.
fn extract_year(objective: &str) -> Option<String> {
    YEAR_PATTERN
        .captures(objective)
        .map(|c| c[1].to_string())
}

/// Product name for the price fan-out: the objective minus question words,
/// price words, and years.
fn extract_product(objective: &str) -> String {
    let kept: Vec<&str> = objective
        .split_whitespace()
        .filter(|token| {
            let trimmed = token.trim_matches(|c: char| !c.is_alphanumeric());
            !trimmed.is_empty() && !PRODUCT_NOISE.is_match(trimmed)
        })
        .collect();
    if kept.is_empty() {
        objective.to_string()
    } else {
        kept.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_year() {
        assert_eq!(
            extract_year("Find NVIDIA H100 GPU pricing 2024").as_deref(),
            Some("2024")
        );
        assert_eq!(extract_year("no year here"), None);
    }

    #[test]
    fn test_extract_product() {
        assert_eq!(
            extract_product("Find NVIDIA H100 GPU pricing 2024"),
            "NVIDIA H100 GPU"
        );
        assert_eq!(
            extract_product("What is the cost of AMD MI300 in 2025"),
            "AMD MI300"
        );
    }

    #[test]
    fn test_extract_product_never_empty() {
        assert_eq!(extract_product("price 2024"), "price 2024");
    }

    #[test]
    fn test_summarize_flattens_and_caps() {
        let content = format!("line one\nline   two {}", "x".repeat(500));
        let summary = summarize(&content);
        assert!(summary.starts_with("line one line two"));
        assert_eq!(summary.chars().count(), SUMMARY_CHARS);
    }

    #[test]
    fn test_synthesis_prompt_embeds_intel() {
        let prompt = synthesis_prompt("objective text", "EVIDENCE BODY");
        assert!(prompt.contains("OBJECTIVE: objective text"));
        assert!(prompt.contains("EVIDENCE:\nEVIDENCE BODY"));
    }
}
