//! OpenAI embedding provider implementation

use super::EmbeddingModel;
use async_trait::async_trait;
use intelscout_config::EmbeddingConfig;
use intelscout_core::{IntelScoutError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;

/// Remote embedding model (text-embedding-3-* family).
#[derive(Debug)]
pub struct OpenAiEmbedding {
    model: String,
    api_key: String,
    client: Client,
    base_url: String,
    dimensions: usize,
}

impl OpenAiEmbedding {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key =
            env::var(&config.api_key_env).map_err(|_| IntelScoutError::Configuration {
                message: format!(
                    "API key environment variable '{}' not set",
                    config.api_key_env
                ),
                source: None,
            })?;

        Ok(Self {
            model: config.model_name.clone(),
            api_key,
            client: Client::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingModel for OpenAiEmbedding {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
            dimensions: Some(self.dimensions),
            encoding_format: "float".to_string(),
        };

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| IntelScoutError::Embedding {
                message: format!("failed to send embedding request: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(IntelScoutError::Embedding {
                message: format!("embedding API error ({status}): {text}"),
                source: None,
            });
        }

        let parsed: EmbeddingResponse =
            response.json().await.map_err(|e| IntelScoutError::Embedding {
                message: format!("failed to parse embedding response: {e}"),
                source: Some(Box::new(e)),
            })?;

        // Sort by index so outputs align with inputs
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    input: Vec<String>,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_ordering() {
        let json = r#"{
            "data": [
                {"embedding": [0.2], "index": 1},
                {"embedding": [0.1], "index": 0}
            ]
        }"#;
        let parsed: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        assert_eq!(data[0].embedding, vec![0.1]);
        assert_eq!(data[1].embedding, vec![0.2]);
    }
}
