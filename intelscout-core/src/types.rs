//! Domain data model: conversations, messages, mission logs, plans, and
//! the transient intel records gathered during a mission.

use crate::tool::ToolKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mission log query text is truncated to this length before persistence.
pub const QUERY_TRUNCATE_CHARS: usize = 255;

/// Lazily derived conversation titles are truncated to this length.
pub const TITLE_TRUNCATE_CHARS: usize = 80;

/// Lifecycle status of a mission attempt. Monotonic: PENDING may move to
/// IN_PROGRESS, which may move to exactly one terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Legal forward transitions only; a terminal status accepts nothing.
    pub fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::InProgress | Self::Completed | Self::Failed),
            Self::InProgress => next.is_terminal(),
            Self::Completed | Self::Failed => false,
        }
    }
}

impl std::fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chat conversation grouping messages and missions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role of a conversation message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// Append-only conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Audit row capturing one mission attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionLog {
    pub id: i64,
    pub conversation_id: i64,
    /// User objective, truncated to [`QUERY_TRUNCATE_CHARS`].
    pub query: String,
    /// Full synthesized report once the mission completes.
    pub response: Option<String>,
    pub status: MissionStatus,
    pub created_at: DateTime<Utc>,
}

/// One piece of evidence gathered during a mission. Transient: lives in the
/// intel pool and is discarded after synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelRecord {
    pub source_tool: ToolKind,
    /// The search query or URL that produced this record.
    pub origin: String,
    pub content: String,
    pub price_bearing: bool,
}

impl IntelRecord {
    pub fn new(source_tool: ToolKind, origin: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source_tool,
            origin: origin.into(),
            content: content.into(),
            price_bearing: false,
        }
    }
}

/// One step of a mission plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub ordinal: u32,
    pub tool: ToolKind,
    pub args: serde_json::Value,
    /// The planner's stated reason for this step.
    pub rationale: String,
}

/// An ordered tool plan produced by the planner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn research_steps(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(|s| s.tool.is_research())
    }

    pub fn action_steps(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(|s| s.tool.is_action())
    }

    /// Fallback plan when planning fails entirely: one verbatim web search.
    pub fn fallback_search(objective: &str) -> Self {
        Self {
            steps: vec![PlanStep {
                ordinal: 1,
                tool: ToolKind::WebSearch,
                args: serde_json::json!({ "query": objective }),
                rationale: "fallback: search the objective verbatim".to_string(),
            }],
        }
    }
}

/// Outcome of one executed tool or action, recorded in the mission trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    Ok,
    Error,
}

/// One mission-trace entry, returned by the buffered execution interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub tool: String,
    pub status: TraceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl TraceEntry {
    pub fn ok(tool: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            status: TraceStatus::Ok,
            result: Some(result.into()),
        }
    }

    pub fn error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            status: TraceStatus::Error,
            result: Some(message.into()),
        }
    }
}

/// Truncate on a char boundary, appending nothing. Used for persisted query
/// text and derived conversation titles.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use MissionStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Pending));
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            MissionStatus::Pending,
            MissionStatus::InProgress,
            MissionStatus::Completed,
            MissionStatus::Failed,
        ] {
            assert_eq!(MissionStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_fallback_plan() {
        let plan = Plan::fallback_search("Summarize AMD MI300 specs");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.steps[0].tool, ToolKind::WebSearch);
        assert_eq!(
            plan.steps[0].args["query"].as_str().unwrap(),
            "Summarize AMD MI300 specs"
        );
    }

    #[test]
    fn test_truncate_chars_boundary() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        // Multi-byte chars must not be split
        assert_eq!(truncate_chars("€€€€", 2), "€€");
    }

    #[test]
    fn test_plan_phase_partition() {
        let plan = Plan {
            steps: vec![
                PlanStep {
                    ordinal: 1,
                    tool: ToolKind::WebSearch,
                    args: serde_json::json!({"query": "a"}),
                    rationale: String::new(),
                },
                PlanStep {
                    ordinal: 2,
                    tool: ToolKind::SaveToNotion,
                    args: serde_json::json!({}),
                    rationale: String::new(),
                },
            ],
        };
        assert_eq!(plan.research_steps().count(), 1);
        assert_eq!(plan.action_steps().count(), 1);
    }
}
