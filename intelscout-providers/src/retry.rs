//! Quota-aware retry with exponential backoff
//!
//! Quota exhaustion (rate limits) is retried up to three attempts with
//! exponential backoff; transport failures get a single retry. Anything
//! else propagates immediately.

use intelscout_core::{IntelScoutError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Classified outcome of a single provider call attempt.
#[derive(Debug)]
pub enum ProviderFailure {
    /// Provider-reported rate limit / quota exhaustion
    Quota(String),
    /// Connection or timeout failure reaching the provider
    Transport(String),
    /// Non-retryable error, propagated as-is
    Fatal(IntelScoutError),
}

/// Retry policy knobs. Tests shrink the backoff; production uses defaults.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub quota_attempts: u32,
    pub transport_attempts: u32,
    pub base_backoff: Duration,
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            quota_attempts: 3,
            transport_attempts: 2,
            base_backoff: Duration::from_secs(2),
            backoff_multiplier: 2,
        }
    }
}

impl RetryPolicy {
    fn backoff_for(&self, attempt: u32) -> Duration {
        // attempt is 1-based; first retry waits the base duration
        self.base_backoff * self.backoff_multiplier.pow(attempt.saturating_sub(1))
    }
}

/// Drive `op` under the retry policy. `op` receives the 1-based attempt
/// number and returns a classified outcome.
pub async fn with_retry<F, Fut>(provider: &str, policy: &RetryPolicy, op: F) -> Result<String>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = std::result::Result<String, ProviderFailure>>,
{
    let mut quota_attempts = 0u32;
    let mut transport_attempts = 0u32;

    loop {
        let attempt = quota_attempts.max(transport_attempts) + 1;
        match op(attempt).await {
            Ok(text) => return Ok(text),
            Err(ProviderFailure::Quota(message)) => {
                quota_attempts += 1;
                if quota_attempts >= policy.quota_attempts {
                    return Err(IntelScoutError::QuotaExhausted {
                        attempts: quota_attempts,
                        message,
                    });
                }
                let backoff = policy.backoff_for(quota_attempts);
                warn!(
                    provider,
                    attempt = quota_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    "provider quota hit, backing off"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(ProviderFailure::Transport(message)) => {
                transport_attempts += 1;
                if transport_attempts >= policy.transport_attempts {
                    return Err(IntelScoutError::UpstreamUnavailable {
                        message,
                        source: None,
                    });
                }
                warn!(provider, "provider unreachable, retrying once");
            }
            Err(ProviderFailure::Fatal(err)) => return Err(err),
        }
    }
}
