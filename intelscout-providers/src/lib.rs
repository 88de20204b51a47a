//! Provider-neutral LLM gateway
//!
//! One `ProviderInstance` is selected at startup from configuration and kept
//! as a shared instance for the process lifetime. The gateway owns the
//! payload-size guard and the quota-aware retry policy so callers never see
//! transient provider limits.

pub mod abstraction;
pub mod gemini;
pub mod openai;
pub mod retry;

pub use abstraction::{
    CompletionRequest, ProviderCapabilities, ProviderInstance, ProviderManager,
};
