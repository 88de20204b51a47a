//! Objective → JSON tool plan
//!
//! Asks the LLM for a JSON array of steps, then extracts the array by
//! matching the first `[` against its closing `]` so surrounding prose
//! cannot break parsing. Malformed steps are dropped with a warning; a
//! completely unparseable response yields an empty plan, which the
//! executor replaces with a verbatim web search.

use intelscout_core::{Plan, PlanStep, ToolKind};
use intelscout_providers::{CompletionRequest, ProviderInstance};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const PLAN_TEMPERATURE: f32 = 0.2;

pub struct Planner {
    provider: Arc<dyn ProviderInstance>,
}

impl Planner {
    pub fn new(provider: Arc<dyn ProviderInstance>) -> Self {
        Self { provider }
    }

    /// Produce a plan for the objective. Never fails: provider errors and
    /// unparseable responses both yield an empty plan.
    pub async fn plan(&self, objective: &str) -> Plan {
        let request = CompletionRequest::new(build_plan_prompt(objective))
            .with_temperature(PLAN_TEMPERATURE);
        match self.provider.complete(&request).await {
            Ok(response) => {
                let plan = parse_plan(&response);
                debug!(steps = plan.len(), "plan produced");
                plan
            }
            Err(e) => {
                warn!(error = %e, "planning call failed, returning empty plan");
                Plan::default()
            }
        }
    }
}

fn build_plan_prompt(objective: &str) -> String {
    format!(
        "You are a market research planner. Produce a JSON array of research \
         steps for the objective below. Each element must have the shape \
         {{\"step\": <int>, \"tool\": <string>, \"args\": <object>, \
         \"thought\": <string>}}. Valid tools: \"web_search\" (args: \
         {{\"query\"}}), \"web_research\" (args: {{\"url\"}}), \
         \"save_to_notion\" (args: {{\"title\"}}), \"dispatch_email\" (args: \
         {{\"to\", \"subject\"}}). Use 2-5 steps, research before actions. \
         Respond with the JSON array only.\n\nOBJECTIVE: {objective}"
    )
}

/// Parse the model response into a validated plan.
pub fn parse_plan(response: &str) -> Plan {
    let Some(array_text) = extract_json_array(response) else {
        warn!("no JSON array found in plan response");
        return Plan::default();
    };
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(array_text) else {
        warn!("plan array failed to parse as JSON");
        return Plan::default();
    };

    let mut steps = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        match validate_step(&item, index) {
            Some(step) => steps.push(step),
            None => warn!(index, "malformed plan step dropped"),
        }
    }
    Plan { steps }
}

fn validate_step(item: &Value, index: usize) -> Option<PlanStep> {
    let object = item.as_object()?;
    let tool_name = object.get("tool")?.as_str()?;
    let tool = ToolKind::from_name(tool_name)?;
    let args = object
        .get("args")
        .filter(|a| a.is_object())
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    let ordinal = object
        .get("step")
        .and_then(Value::as_u64)
        .unwrap_or(index as u64 + 1) as u32;
    let rationale = object
        .get("thought")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(PlanStep {
        ordinal,
        tool,
        args,
        rationale,
    })
}

/// Locate the first `[` and its matching `]`, skipping brackets inside JSON
/// strings.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_PLAN: &str = r#"Here is the plan you asked for:
[
  {"step": 1, "tool": "web_search", "args": {"query": "H100 price"}, "thought": "find listings"},
  {"step": 2, "tool": "web_research", "args": {"url": "https://example.com"}, "thought": "read details"},
  {"step": 3, "tool": "save_to_notion", "args": {"title": "H100 report"}, "thought": "archive"}
]
Let me know if you need anything else."#;

    #[test]
    fn test_parse_plan_with_surrounding_prose() {
        let plan = parse_plan(GOOD_PLAN);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.steps[0].tool, ToolKind::WebSearch);
        assert_eq!(plan.steps[0].args["query"], "H100 price");
        assert_eq!(plan.steps[1].tool, ToolKind::WebResearch);
        assert_eq!(plan.steps[2].tool, ToolKind::SaveToNotion);
        assert_eq!(plan.steps[2].ordinal, 3);
    }

    #[test]
    fn test_malformed_steps_dropped() {
        let response = r#"[
          {"step": 1, "tool": "web_search", "args": {"query": "ok"}, "thought": "fine"},
          {"step": 2, "tool": "teleport", "args": {}, "thought": "unknown tool"},
          "not even an object",
          {"step": 4, "args": {}, "thought": "missing tool"}
        ]"#;
        let plan = parse_plan(response);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.steps[0].tool, ToolKind::WebSearch);
    }

    #[test]
    fn test_total_parse_failure_is_empty_plan() {
        assert!(parse_plan("I cannot help with that.").is_empty());
        assert!(parse_plan("[ this is not json").is_empty());
        assert!(parse_plan("").is_empty());
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let response = r#"[{"tool": "web_search"}]"#;
        let plan = parse_plan(response);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.steps[0].ordinal, 1);
        assert!(plan.steps[0].args.as_object().unwrap().is_empty());
        assert!(plan.steps[0].rationale.is_empty());
    }

    #[test]
    fn test_extract_array_ignores_brackets_in_strings() {
        let text = r#"noise [{"tool": "web_search", "thought": "see [1] and ]extra["}] tail"#;
        let extracted = extract_json_array(text).unwrap();
        let parsed: Value = serde_json::from_str(extracted).unwrap();
        assert!(parsed.is_array());
    }

    #[test]
    fn test_extract_array_nested() {
        let text = r#"[[1, 2], [3]]"#;
        assert_eq!(extract_json_array(text).unwrap(), text);
    }

    #[test]
    fn test_prompt_mentions_objective_and_tools() {
        let prompt = build_plan_prompt("Find H100 pricing");
        assert!(prompt.contains("OBJECTIVE: Find H100 pricing"));
        assert!(prompt.contains("web_search"));
        assert!(prompt.contains("dispatch_email"));
    }
}
