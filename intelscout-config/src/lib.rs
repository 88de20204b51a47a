//! Central configuration management for rs-intelscout
//!
//! Handles TOML parsing, validation, and environment variable overrides.
//! Every process-level knob enumerated by the external-interface contract
//! lives here; components receive their sub-config by value at init.

use intelscout_core::{IntelScoutError, Result};
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::path::Path;
use tracing::debug;

/// Configuration file discovery order
const CONFIG_SEARCH_PATHS: &[&str] = &[
    "intelscout.toml",
    ".intelscout.toml",
    "config/intelscout.toml",
];

/// Environment variable prefix
const ENV_PREFIX: &str = "INTELSCOUT_";

/// Central intelscout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelScoutConfig {
    /// LLM provider selection and credentials
    pub provider: ProviderConfig,
    /// Embedding model selection
    pub embedding: EmbeddingConfig,
    /// Relational and vector persistence
    pub storage: StorageConfig,
    /// Tool timeouts and limits
    pub tools: ToolsConfig,
    /// Action credentials (notebook, email)
    pub actions: ActionsConfig,
    /// Settings consumed by the external transport layer
    pub server: ServerConfig,
}

impl Default for IntelScoutConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            embedding: EmbeddingConfig::default(),
            storage: StorageConfig::default(),
            tools: ToolsConfig::default(),
            actions: ActionsConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Active provider name ("openai" or "gemini")
    pub name: String,
    /// Model to use; for the free-tier provider this seeds the candidate list
    pub model_name: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Hard per-request payload ceiling in bytes; 0 means provider default
    pub max_payload_bytes: usize,
    /// Per-call timeout in seconds
    pub llm_timeout_secs: u64,
    /// Candidate models probed at startup by free-tier providers
    pub model_candidates: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "gemini".to_string(),
            model_name: "gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            max_payload_bytes: 0,
            llm_timeout_secs: 60,
            model_candidates: vec![
                "gemini-2.0-flash".to_string(),
                "gemini-2.0-flash-lite".to_string(),
                "gemini-1.5-flash".to_string(),
            ],
        }
    }
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model id; "hash" selects the deterministic local fallback
    pub model_name: String,
    /// Environment variable holding the API key (remote models only)
    pub api_key_env: String,
    /// Vector dimension D; all collections share this
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "hash".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimensions: 384,
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path (":memory:" for ephemeral)
    pub database_url: String,
    /// Directory holding the persistent vector collection
    pub vector_dir: String,
    /// Relational connection pool size
    pub pool_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "intelscout.db".to_string(),
            vector_dir: "vector_store".to_string(),
            pool_size: 5,
        }
    }
}

/// Tool timeouts and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Top-level scraper deadline in seconds
    pub scraper_timeout_secs: u64,
    /// Search backend timeout in seconds
    pub search_timeout_secs: u64,
    /// Maximum search results retained per query
    pub search_max_results: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            scraper_timeout_secs: 60,
            search_timeout_secs: 30,
            search_max_results: 8,
        }
    }
}

/// Credentials for side-effect actions
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ActionsConfig {
    /// Environment variable holding the Notion integration token
    pub notion_token_env: String,
    /// Notion parent page id receiving saved reports
    pub notion_parent_page: String,
    /// SMTP relay host
    pub smtp_host: String,
    /// SMTP port
    pub smtp_port: u16,
    /// SMTP username
    pub smtp_username: String,
    /// Environment variable holding the SMTP password
    pub smtp_password_env: String,
    /// From address for dispatched email
    pub smtp_from: String,
}

/// Settings owned by the external HTTP transport; enumerated here so one
/// config file covers the whole process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub cors_allowed_origins: Vec<String>,
    /// Environment variable holding the inbound API key
    pub api_key_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            api_key_env: "INTELSCOUT_API_KEY".to_string(),
        }
    }
}

impl IntelScoutConfig {
    /// Load configuration: discovery path walk, then env overrides.
    pub fn load() -> Result<Self> {
        let mut config = CONFIG_SEARCH_PATHS
            .iter()
            .find_map(|p| {
                let path = Path::new(p);
                path.exists().then(|| Self::from_file(path))
            })
            .transpose()?
            .unwrap_or_default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a specific TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| IntelScoutError::Configuration {
            message: format!("failed to read config file '{}'", path.display()),
            source: Some(Box::new(e)),
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| IntelScoutError::Configuration {
            message: format!("failed to parse config file '{}'", path.display()),
            source: Some(Box::new(e)),
        })?;
        debug!(path = %path.display(), "loaded configuration file");
        Ok(config)
    }

    /// Apply `INTELSCOUT_*` environment overrides on top of file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std_env::var(format!("{ENV_PREFIX}PROVIDER")) {
            self.provider.name = v;
        }
        if let Ok(v) = std_env::var(format!("{ENV_PREFIX}MODEL_NAME")) {
            self.provider.model_name = v;
        }
        if let Ok(v) = std_env::var(format!("{ENV_PREFIX}MAX_PAYLOAD_BYTES")) {
            if let Ok(n) = v.parse() {
                self.provider.max_payload_bytes = n;
            }
        }
        if let Ok(v) = std_env::var(format!("{ENV_PREFIX}LLM_TIMEOUT_SECS")) {
            if let Ok(n) = v.parse() {
                self.provider.llm_timeout_secs = n;
            }
        }
        if let Ok(v) = std_env::var(format!("{ENV_PREFIX}EMBEDDING_MODEL_NAME")) {
            self.embedding.model_name = v;
        }
        if let Ok(v) = std_env::var(format!("{ENV_PREFIX}DATABASE_URL")) {
            self.storage.database_url = v;
        }
        if let Ok(v) = std_env::var(format!("{ENV_PREFIX}VECTOR_DIR")) {
            self.storage.vector_dir = v;
        }
        if let Ok(v) = std_env::var(format!("{ENV_PREFIX}SCRAPER_TIMEOUT_SECS")) {
            if let Ok(n) = v.parse() {
                self.tools.scraper_timeout_secs = n;
            }
        }
        if let Ok(v) = std_env::var(format!("{ENV_PREFIX}SEARCH_TIMEOUT_SECS")) {
            if let Ok(n) = v.parse() {
                self.tools.search_timeout_secs = n;
            }
        }
        if let Ok(v) = std_env::var(format!("{ENV_PREFIX}CORS_ALLOWED_ORIGINS")) {
            self.server.cors_allowed_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
    }

    /// Reject configurations no component could run with.
    pub fn validate(&self) -> Result<()> {
        if self.provider.name != "openai" && self.provider.name != "gemini" {
            return Err(IntelScoutError::Configuration {
                message: format!("unknown provider '{}'", self.provider.name),
                source: None,
            });
        }
        if self.embedding.dimensions == 0 {
            return Err(IntelScoutError::Configuration {
                message: "embedding dimensions must be non-zero".to_string(),
                source: None,
            });
        }
        if self.storage.pool_size == 0 {
            return Err(IntelScoutError::Configuration {
                message: "storage pool_size must be non-zero".to_string(),
                source: None,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let config = IntelScoutConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.pool_size, 5);
        assert_eq!(config.tools.scraper_timeout_secs, 60);
        assert_eq!(config.tools.search_timeout_secs, 30);
    }

    #[test]
    fn test_from_file_partial_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[provider]
name = "openai"
model_name = "gpt-4o-mini"

[storage]
database_url = ":memory:"
"#
        )
        .unwrap();

        let config = IntelScoutConfig::from_file(file.path()).unwrap();
        assert_eq!(config.provider.name, "openai");
        assert_eq!(config.provider.model_name, "gpt-4o-mini");
        assert_eq!(config.storage.database_url, ":memory:");
        // Untouched sections keep defaults
        assert_eq!(config.embedding.dimensions, 384);
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let config = IntelScoutConfig {
            provider: ProviderConfig {
                name: "parrot".to_string(),
                ..ProviderConfig::default()
            },
            ..IntelScoutConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
