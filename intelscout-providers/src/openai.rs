//! OpenAI chat-completion provider

use crate::abstraction::{
    guard_payload, CompletionRequest, ProviderCapabilities, ProviderInstance,
    PAID_TIER_MAX_PAYLOAD_BYTES,
};
use crate::retry::{with_retry, ProviderFailure, RetryPolicy};
use async_trait::async_trait;
use intelscout_config::ProviderConfig;
use intelscout_core::{IntelScoutError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// OpenAI provider implementation
pub struct OpenAiProvider {
    model: String,
    api_key: String,
    client: Client,
    base_url: String,
    capabilities: ProviderCapabilities,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key =
            env::var(&config.api_key_env).map_err(|_| IntelScoutError::Configuration {
                message: format!(
                    "API key environment variable '{}' not set",
                    config.api_key_env
                ),
                source: None,
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .build()
            .map_err(|e| IntelScoutError::Configuration {
                message: "failed to build HTTP client".to_string(),
                source: Some(Box::new(e)),
            })?;

        let max_payload_bytes = if config.max_payload_bytes > 0 {
            config.max_payload_bytes
        } else {
            PAID_TIER_MAX_PAYLOAD_BYTES
        };

        Ok(Self {
            model: config.model_name.clone(),
            api_key,
            client,
            base_url: "https://api.openai.com/v1".to_string(),
            capabilities: ProviderCapabilities {
                max_payload_bytes,
                supports_model_discovery: false,
            },
            retry: RetryPolicy::default(),
        })
    }

    fn build_body(&self, request: &CompletionRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl ProviderInstance for OpenAiProvider {
    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = self.build_body(request);
        let serialized = serde_json::to_string(&body).map_err(|e| IntelScoutError::Provider {
            message: "failed to serialize completion request".to_string(),
            provider: Some("openai".to_string()),
            source: Some(Box::new(e)),
        })?;
        guard_payload(serialized.len(), self.capabilities.max_payload_bytes)?;

        let url = format!("{}/chat/completions", self.base_url);
        with_retry("openai", &self.retry, |_attempt| {
            let serialized = serialized.clone();
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .post(&url)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .header("Content-Type", "application/json")
                    .body(serialized)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_timeout() || e.is_connect() {
                            ProviderFailure::Transport(format!("openai unreachable: {e}"))
                        } else {
                            ProviderFailure::Fatal(IntelScoutError::Provider {
                                message: format!("request failed: {e}"),
                                provider: Some("openai".to_string()),
                                source: Some(Box::new(e)),
                            })
                        }
                    })?;

                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(ProviderFailure::Quota(format!(
                        "openai rate limited ({status})"
                    )));
                }
                if status.is_server_error() {
                    return Err(ProviderFailure::Transport(format!(
                        "openai server error ({status})"
                    )));
                }
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(ProviderFailure::Fatal(IntelScoutError::Provider {
                        message: format!("openai API error ({status}): {text}"),
                        provider: Some("openai".to_string()),
                        source: None,
                    }));
                }

                let parsed: ChatResponse = response.json().await.map_err(|e| {
                    ProviderFailure::Fatal(IntelScoutError::Provider {
                        message: format!("failed to parse completion response: {e}"),
                        provider: Some("openai".to_string()),
                        source: Some(Box::new(e)),
                    })
                })?;

                parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| {
                        ProviderFailure::Fatal(IntelScoutError::Provider {
                            message: "completion response contained no choices".to_string(),
                            provider: Some("openai".to_string()),
                            source: None,
                        })
                    })
            }
        })
        .await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}
