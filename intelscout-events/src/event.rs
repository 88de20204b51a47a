//! Wire-format progress events

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event in a mission's progress stream. Serialized as newline-delimited
/// JSON, one object per line, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Thinking {
        content: String,
    },
    Progress {
        step: usize,
        total: usize,
        percentage: u8,
    },
    ToolStart {
        tool: String,
        args: Value,
    },
    ToolComplete {
        tool: String,
        summary: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ActionStart {
        action: String,
        title: String,
    },
    ActionComplete {
        action: String,
        result: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Complete {
        report: String,
    },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },
}

impl ProgressEvent {
    /// `complete` and `error` are terminal: nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Progress step number, for monotonicity enforcement.
    pub fn progress_step(&self) -> Option<usize> {
        match self {
            Self::Progress { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn progress(step: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            ((step * 100) / total).min(100) as u8
        };
        Self::Progress {
            step,
            total,
            percentage,
        }
    }

    /// Serialize as one NDJSON line, newline included.
    pub fn to_ndjson_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","error":"event serialization failed"}"#.to_string()
        });
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tags() {
        let event = ProgressEvent::ToolStart {
            tool: "web_search".to_string(),
            args: serde_json::json!({"query": "q"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"tool_start\""));
        assert!(json.contains("\"tool\":\"web_search\""));
    }

    #[test]
    fn test_error_field_elided_when_absent() {
        let event = ProgressEvent::ToolComplete {
            tool: "web_search".to_string(),
            summary: "3 results".to_string(),
            error: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("error"));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(ProgressEvent::Complete {
            report: String::new()
        }
        .is_terminal());
        assert!(ProgressEvent::Error {
            error: "x".to_string(),
            context: None
        }
        .is_terminal());
        assert!(!ProgressEvent::Thinking {
            content: String::new()
        }
        .is_terminal());
    }

    #[test]
    fn test_progress_percentage() {
        match ProgressEvent::progress(2, 4) {
            ProgressEvent::Progress { percentage, .. } => assert_eq!(percentage, 50),
            _ => unreachable!(),
        }
        match ProgressEvent::progress(0, 0) {
            ProgressEvent::Progress { percentage, .. } => assert_eq!(percentage, 100),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_ndjson_line() {
        let line = ProgressEvent::Thinking {
            content: "planning".to_string(),
        }
        .to_ndjson_line();
        assert!(line.ends_with('\n'));
        let parsed: ProgressEvent = serde_json::from_str(line.trim()).unwrap();
        assert!(matches!(parsed, ProgressEvent::Thinking { .. }));
    }
}
