//! Provider abstraction layer defining capabilities and the manager

use async_trait::async_trait;
use intelscout_config::ProviderConfig;
use intelscout_core::{IntelScoutError, Result};
use std::sync::Arc;
use tracing::info;

/// Conservative payload ceiling for free-tier, high-throughput providers.
pub const FREE_TIER_MAX_PAYLOAD_BYTES: usize = 28 * 1024;

/// Payload ceiling for paid providers with large context windows.
pub const PAID_TIER_MAX_PAYLOAD_BYTES: usize = 120 * 1024;

/// Capabilities reported by a provider instance
#[derive(Debug, Clone)]
pub struct ProviderCapabilities {
    /// Hard ceiling on the serialized request body, enforced before send
    pub max_payload_bytes: usize,
    /// Whether the provider probes a candidate model list at startup
    pub supports_model_discovery: bool,
}

/// A fully-formed completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Trait for LLM provider implementations
#[async_trait]
pub trait ProviderInstance: Send + Sync {
    /// Get the provider's capabilities
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Execute a completion request, returning the response text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Provider name
    fn name(&self) -> &str;

    /// Active model
    fn model(&self) -> &str;
}

/// Fail fast when a serialized request body would exceed the provider's
/// ceiling; over-budget requests are never sent upstream.
pub fn guard_payload(serialized_len: usize, limit: usize) -> Result<()> {
    if serialized_len > limit {
        return Err(IntelScoutError::PayloadTooLarge {
            actual: serialized_len,
            limit,
        });
    }
    Ok(())
}

/// Process-wide provider selection. Built once at startup by the service
/// layer and passed down; no ambient globals.
pub struct ProviderManager {
    active: Arc<dyn ProviderInstance>,
}

impl ProviderManager {
    /// Select and initialize the configured provider. Free-tier providers
    /// run their model discovery here, so a bad candidate list fails at
    /// startup rather than mid-mission.
    pub async fn from_config(config: &ProviderConfig) -> Result<Self> {
        let active: Arc<dyn ProviderInstance> = match config.name.as_str() {
            "openai" => Arc::new(crate::openai::OpenAiProvider::from_config(config)?),
            "gemini" => Arc::new(crate::gemini::GeminiProvider::from_config(config).await?),
            other => {
                return Err(IntelScoutError::Configuration {
                    message: format!("unknown provider '{other}'"),
                    source: None,
                })
            }
        };
        info!(provider = active.name(), model = active.model(), "LLM gateway ready");
        Ok(Self { active })
    }

    /// Wrap an already-built instance; used by tests and embedders.
    pub fn with_instance(instance: Arc<dyn ProviderInstance>) -> Self {
        Self { active: instance }
    }

    /// The shared active provider.
    pub fn active(&self) -> Arc<dyn ProviderInstance> {
        Arc::clone(&self.active)
    }

    /// The active provider's payload ceiling, used by the intel curator to
    /// derive its pool budget.
    pub fn max_payload_bytes(&self) -> usize {
        self.active.capabilities().max_payload_bytes
    }
}
