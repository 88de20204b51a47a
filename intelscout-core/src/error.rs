//! Error types and handling for rs-intelscout

use thiserror::Error;

/// Boxed source error carried by variants that wrap an upstream failure.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Comprehensive error enum for all intelscout operations
#[derive(Debug, Error)]
pub enum IntelScoutError {
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Unsafe URL rejected: {message}")]
    UnsafeUrl { message: String },

    #[error("Scrape failed for '{url}': {message}")]
    ScrapeFailed { url: String, message: String },

    #[error("Search failed: {message}")]
    SearchFailed {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    #[error("Payload too large: {actual} bytes exceeds the {limit} byte provider ceiling")]
    PayloadTooLarge { actual: usize, limit: usize },

    #[error("Provider quota exhausted after {attempts} attempts: {message}")]
    QuotaExhausted { attempts: u32, message: String },

    #[error("Upstream provider unavailable: {message}")]
    UpstreamUnavailable {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    #[error("LLM provider error: {message}")]
    Provider {
        message: String,
        provider: Option<String>,
        #[source]
        source: Option<BoxedError>,
    },

    #[error("Embedding provider error: {message}")]
    Embedding {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    #[error("Vector store error: {message}")]
    VectorStore {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    #[error("Action '{action}' failed: {message}")]
    ActionFailed { action: String, message: String },

    #[error("Planning error: {message}")]
    Planning { message: String },

    #[error("Mission cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl IntelScoutError {
    /// Tool-level failures are recorded in the mission trace but never fail
    /// the mission; everything else propagates.
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            Self::UnsafeUrl { .. }
                | Self::ScrapeFailed { .. }
                | Self::SearchFailed { .. }
                | Self::ActionFailed { .. }
        )
    }

    /// True for errors that terminate the mission as a whole.
    pub fn is_mission_fatal(&self) -> bool {
        matches!(
            self,
            Self::PayloadTooLarge { .. }
                | Self::QuotaExhausted { .. }
                | Self::UpstreamUnavailable { .. }
                | Self::Provider { .. }
                | Self::Cancelled { .. }
        )
    }

    /// Shorthand for an internal invariant breach.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, IntelScoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failure_classification() {
        let err = IntelScoutError::ScrapeFailed {
            url: "https://example.com".to_string(),
            message: "timeout".to_string(),
        };
        assert!(err.is_tool_failure());
        assert!(!err.is_mission_fatal());

        let err = IntelScoutError::QuotaExhausted {
            attempts: 3,
            message: "rate limited".to_string(),
        };
        assert!(!err.is_tool_failure());
        assert!(err.is_mission_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = IntelScoutError::PayloadTooLarge {
            actual: 40_000,
            limit: 28_672,
        };
        let text = err.to_string();
        assert!(text.contains("40000"));
        assert!(text.contains("28672"));
    }
}
