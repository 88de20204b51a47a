//! Gemini free-tier provider with startup model discovery
//!
//! The free tier rotates which models an API key may call, so the provider
//! probes a configured candidate list once at startup (with an inter-probe
//! cooldown to stay under the per-minute quota) and caches the first model
//! that answers.

use crate::abstraction::{
    guard_payload, CompletionRequest, ProviderCapabilities, ProviderInstance,
    FREE_TIER_MAX_PAYLOAD_BYTES,
};
use crate::retry::{with_retry, ProviderFailure, RetryPolicy};
use async_trait::async_trait;
use intelscout_config::ProviderConfig;
use intelscout_core::{IntelScoutError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

/// Minimum wait between startup model probes.
const PROBE_COOLDOWN: Duration = Duration::from_secs(5);

/// Gemini provider implementation
pub struct GeminiProvider {
    model: String,
    api_key: String,
    client: Client,
    base_url: String,
    capabilities: ProviderCapabilities,
    retry: RetryPolicy,
}

impl GeminiProvider {
    /// Build the provider, running model discovery over the candidate list.
    pub async fn from_config(config: &ProviderConfig) -> Result<Self> {
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

        let base_url = "https://generativelanguage.googleapis.com/v1beta".to_string();

        let mut candidates = config.model_candidates.clone();
        if candidates.is_empty() {
            candidates.push(config.model_name.clone());
        }
        let model = discover_model(&client, &base_url, &api_key, &candidates).await?;

        let max_payload_bytes = if config.max_payload_bytes > 0 {
            config.max_payload_bytes
        } else {
            FREE_TIER_MAX_PAYLOAD_BYTES
        };

        Ok(Self {
            model,
            api_key,
            client,
            base_url,
            capabilities: ProviderCapabilities {
                max_payload_bytes,
                supports_model_discovery: true,
            },
            retry: RetryPolicy::default(),
        })
    }

    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }
}

/// Probe candidates in order, caching the first that answers a minimal
/// request. Probes are spaced by [`PROBE_COOLDOWN`].
async fn discover_model(
    client: &Client,
    base_url: &str,
    api_key: &str,
    candidates: &[String],
) -> Result<String> {
    for (i, candidate) in candidates.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(PROBE_COOLDOWN).await;
        }
        let url = format!("{base_url}/models/{candidate}:generateContent?key={api_key}");
        let probe = GenerateRequest::probe();
        match client.post(&url).json(&probe).send().await {
            Ok(response) if response.status().is_success() => {
                info!(model = candidate.as_str(), "model discovery succeeded");
                return Ok(candidate.clone());
            }
            Ok(response) => {
                warn!(
                    model = candidate.as_str(),
                    status = %response.status(),
                    "model probe rejected, trying next candidate"
                );
            }
            Err(e) => {
                warn!(
                    model = candidate.as_str(),
                    error = %e,
                    "model probe failed, trying next candidate"
                );
            }
        }
    }
    Err(IntelScoutError::Configuration {
        message: format!("no working model among {} candidates", candidates.len()),
        source: None,
    })
}

#[async_trait]
impl ProviderInstance for GeminiProvider {
    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = GenerateRequest::from_completion(request);
        let serialized = serde_json::to_string(&body).map_err(|e| IntelScoutError::Provider {
            message: "failed to serialize completion request".to_string(),
            provider: Some("gemini".to_string()),
            source: Some(Box::new(e)),
        })?;
        guard_payload(serialized.len(), self.capabilities.max_payload_bytes)?;

        let url = self.generate_url(&self.model);
        with_retry("gemini", &self.retry, |_attempt| {
            let serialized = serialized.clone();
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .post(&url)
                    .header("Content-Type", "application/json")
                    .body(serialized)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_timeout() || e.is_connect() {
                            ProviderFailure::Transport(format!("gemini unreachable: {e}"))
                        } else {
                            ProviderFailure::Fatal(IntelScoutError::Provider {
                                message: format!("request failed: {e}"),
                                provider: Some("gemini".to_string()),
                                source: Some(Box::new(e)),
                            })
                        }
                    })?;

                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(ProviderFailure::Quota(format!(
                        "gemini quota exhausted ({status})"
                    )));
                }
                if status.is_server_error() {
                    return Err(ProviderFailure::Transport(format!(
                        "gemini server error ({status})"
                    )));
                }
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(ProviderFailure::Fatal(IntelScoutError::Provider {
                        message: format!("gemini API error ({status}): {text}"),
                        provider: Some("gemini".to_string()),
                        source: None,
                    }));
                }

                let parsed: GenerateResponse = response.json().await.map_err(|e| {
                    ProviderFailure::Fatal(IntelScoutError::Provider {
                        message: format!("failed to parse completion response: {e}"),
                        provider: Some("gemini".to_string()),
                        source: Some(Box::new(e)),
                    })
                })?;

                parsed.first_text().ok_or_else(|| {
                    ProviderFailure::Fatal(IntelScoutError::Provider {
                        message: "completion response contained no candidates".to_string(),
                        provider: Some("gemini".to_string()),
                        source: None,
                    })
                })
            }
        })
        .await
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GenerateRequest {
    fn from_completion(request: &CompletionRequest) -> Self {
        let generation_config =
            if request.temperature.is_some() || request.max_tokens.is_some() {
                Some(GenerationConfig {
                    temperature: request.temperature,
                    max_output_tokens: request.max_tokens,
                })
            } else {
                None
            };
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config,
        }
    }

    /// Minimal request used by model discovery.
    fn probe() -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: "ping".to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: None,
                max_output_tokens: Some(1),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content
            .parts
            .into_iter()
            .next()
            .map(|p| p.text)
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "report body"}], "role": "model"}}
            ]
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.first_text().as_deref(), Some("report body"));
    }

    #[test]
    fn test_empty_response() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.first_text().is_none());
    }

    #[test]
    fn test_probe_is_tiny() {
        let probe = GenerateRequest::probe();
        let serialized = serde_json::to_string(&probe).unwrap();
        assert!(serialized.len() < 200);
        assert!(serialized.contains("maxOutputTokens"));
    }
}
