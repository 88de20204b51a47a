//! Side-effect action dispatcher: external notebook save and email
//!
//! Action failures are recorded by the executor but never abort a mission;
//! the mission is complete once synthesis succeeded.

use intelscout_config::ActionsConfig;
use intelscout_core::{IntelScoutError, Result, ToolKind};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

const NOTION_API: &str = "https://api.notion.com/v1/pages";
const NOTION_VERSION: &str = "2022-06-28";
/// Notion rejects rich-text fragments longer than this.
const NOTION_BLOCK_LIMIT: usize = 2000;

/// Resolved action credentials; secrets are pulled from the environment
/// once at startup.
#[derive(Debug, Clone, Default)]
pub struct ActionsSetup {
    pub notion_token: Option<String>,
    pub notion_parent_page: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: Option<String>,
    pub smtp_from: String,
}

impl ActionsSetup {
    pub fn from_config(config: &ActionsConfig) -> Self {
        Self {
            notion_token: read_env(&config.notion_token_env),
            notion_parent_page: config.notion_parent_page.clone(),
            smtp_host: config.smtp_host.clone(),
            smtp_port: config.smtp_port,
            smtp_username: config.smtp_username.clone(),
            smtp_password: read_env(&config.smtp_password_env),
            smtp_from: config.smtp_from.clone(),
        }
    }
}

fn read_env(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Dispatches the action steps of a plan.
pub struct ActionDispatcher {
    client: Client,
    setup: ActionsSetup,
}

impl ActionDispatcher {
    pub fn new(setup: ActionsSetup) -> Self {
        Self {
            client: Client::new(),
            setup,
        }
    }

    /// Route an action step. Research tools never reach this dispatcher;
    /// hitting one here is an executor bug, not an action failure.
    pub async fn dispatch(&self, kind: ToolKind, args: &Value, report: &str) -> Result<String> {
        match kind {
            ToolKind::SaveToNotion => {
                let title = args
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or("Research Report");
                self.save_to_notion(title, report).await
            }
            ToolKind::DispatchEmail => {
                let to = args.get("to").and_then(Value::as_str).ok_or_else(|| {
                    action_failed("dispatch_email", "missing recipient address")
                })?;
                let subject = args
                    .get("subject")
                    .and_then(Value::as_str)
                    .unwrap_or("Research Report");
                self.dispatch_email(to, subject, report).await
            }
            ToolKind::WebSearch | ToolKind::WebResearch => Err(IntelScoutError::internal(
                "research tool routed to action dispatcher",
            )),
        }
    }

    /// Create a Notion page titled `title` with the report as paragraph
    /// blocks.
    pub async fn save_to_notion(&self, title: &str, content: &str) -> Result<String> {
        let Some(token) = &self.setup.notion_token else {
            return Err(action_failed("save_to_notion", "notebook token not configured"));
        };
        if self.setup.notion_parent_page.is_empty() {
            return Err(action_failed("save_to_notion", "parent page not configured"));
        }

        let body = json!({
            "parent": { "page_id": self.setup.notion_parent_page },
            "properties": {
                "title": { "title": [ { "text": { "content": title } } ] }
            },
            "children": paragraph_blocks(content),
        });

        let response = self
            .client
            .post(NOTION_API)
            .header("Authorization", format!("Bearer {token}"))
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| action_failed("save_to_notion", format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(action_failed(
                "save_to_notion",
                format!("API returned {status}: {text}"),
            ));
        }

        info!(title, "report saved to external notebook");
        Ok(format!("saved report '{title}' to notebook"))
    }

    /// Send the report over SMTP.
    pub async fn dispatch_email(&self, to: &str, subject: &str, body: &str) -> Result<String> {
        if self.setup.smtp_host.is_empty() {
            return Err(action_failed("dispatch_email", "SMTP relay not configured"));
        }

        let from = self
            .setup
            .smtp_from
            .parse()
            .map_err(|e| action_failed("dispatch_email", format!("bad from address: {e}")))?;
        let to_addr = to
            .parse()
            .map_err(|e| action_failed("dispatch_email", format!("bad recipient: {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(to_addr)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| action_failed("dispatch_email", format!("failed to build message: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.setup.smtp_host)
            .map_err(|e| action_failed("dispatch_email", format!("bad relay host: {e}")))?
            .port(self.setup.smtp_port);
        if let Some(password) = &self.setup.smtp_password {
            builder = builder.credentials(Credentials::new(
                self.setup.smtp_username.clone(),
                password.clone(),
            ));
        }
        let transport = builder.build();

        transport
            .send(message)
            .await
            .map_err(|e| action_failed("dispatch_email", format!("send failed: {e}")))?;

        info!(to, subject, "report dispatched by email");
        Ok(format!("report emailed to {to}"))
    }
}

fn action_failed(action: &str, message: impl Into<String>) -> IntelScoutError {
    IntelScoutError::ActionFailed {
        action: action.to_string(),
        message: message.into(),
    }
}

/// Split content into paragraph blocks under the per-block character limit,
/// preferring line boundaries.
fn paragraph_blocks(content: &str) -> Vec<Value> {
    let mut blocks = Vec::new();
    let mut current = String::new();

    let mut push_block = |text: &str| {
        if !text.is_empty() {
            blocks.push(json!({
                "object": "block",
                "type": "paragraph",
                "paragraph": {
                    "rich_text": [ { "type": "text", "text": { "content": text } } ]
                }
            }));
        }
    };

    for line in content.lines() {
        if current.chars().count() + line.chars().count() + 1 > NOTION_BLOCK_LIMIT {
            push_block(current.trim_end());
            current.clear();
        }
        // A single line over the limit is hard-split
        let mut rest = line;
        while rest.chars().count() > NOTION_BLOCK_LIMIT {
            let split_at = rest
                .char_indices()
                .nth(NOTION_BLOCK_LIMIT)
                .map_or(rest.len(), |(i, _)| i);
            push_block(&rest[..split_at]);
            rest = &rest[split_at..];
        }
        current.push_str(rest);
        current.push('\n');
    }
    push_block(current.trim_end());
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_notion_is_action_failure() {
        let dispatcher = ActionDispatcher::new(ActionsSetup::default());
        let err = dispatcher
            .dispatch(ToolKind::SaveToNotion, &json!({"title": "t"}), "report")
            .await
            .unwrap_err();
        assert!(matches!(err, IntelScoutError::ActionFailed { .. }));
        assert!(err.is_tool_failure());
    }

    #[tokio::test]
    async fn test_email_requires_recipient() {
        let dispatcher = ActionDispatcher::new(ActionsSetup::default());
        let err = dispatcher
            .dispatch(ToolKind::DispatchEmail, &json!({}), "report")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IntelScoutError::ActionFailed { ref action, .. } if action == "dispatch_email"
        ));
    }

    #[tokio::test]
    async fn test_research_tool_is_internal_error() {
        let dispatcher = ActionDispatcher::new(ActionsSetup::default());
        let err = dispatcher
            .dispatch(ToolKind::WebSearch, &json!({}), "report")
            .await
            .unwrap_err();
        assert!(matches!(err, IntelScoutError::Internal { .. }));
    }

    #[test]
    fn test_paragraph_blocks_respect_limit() {
        let content = format!("{}\n{}", "a".repeat(2500), "short line");
        let blocks = paragraph_blocks(&content);
        assert!(blocks.len() >= 2);
        for block in &blocks {
            let text = block["paragraph"]["rich_text"][0]["text"]["content"]
                .as_str()
                .unwrap();
            assert!(text.chars().count() <= NOTION_BLOCK_LIMIT);
        }
    }

    #[test]
    fn test_paragraph_blocks_keep_short_content_whole() {
        let blocks = paragraph_blocks("line one\nline two");
        assert_eq!(blocks.len(), 1);
        let text = blocks[0]["paragraph"]["rich_text"][0]["text"]["content"]
            .as_str()
            .unwrap();
        assert_eq!(text, "line one\nline two");
    }
}
