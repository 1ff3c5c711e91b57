//! Ollama embedding backend
//!
//! Blocking HTTP client for Ollama's `/api/embed` endpoint. Every request is
//! bounded by the configured timeout.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

use super::EmbeddingProvider;

/// Ollama embedding backend
#[derive(Clone)]
pub struct OllamaEmbedder {
    http_client: Client,
    base_url: String,
    model: String,
}

/// Request to Ollama embed API
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response from Ollama embed API
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| Error::InvalidData(format!("Invalid Ollama host '{}': {}", base_url, e)))?;

        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Self::new(
            &config.host,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn host(&self) -> &str {
        &self.base_url
    }

    /// Check if the Ollama server is reachable
    pub fn health_check(&self) -> bool {
        self.http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .http_client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()?
            .error_for_status()?;

        let body: EmbedResponse = response.json()?;
        debug!(
            model = %self.model,
            count = body.embeddings.len(),
            "Ollama returned embeddings"
        );

        if body.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                body.embeddings.len(),
                texts.len()
            )));
        }

        Ok(body.embeddings)
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn fingerprint(&self) -> String {
        format!("ollama:{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockOllamaServer;

    #[test]
    fn test_embed_against_mock_server() {
        let server = MockOllamaServer::start();
        let embedder =
            OllamaEmbedder::new(&server.url(), "nomic-embed-text", Duration::from_secs(5))
                .unwrap();

        let texts = vec!["NETFLIX.COM".to_string(), "Whole Foods".to_string()];
        let vectors = embedder.embed(&texts).unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(!vectors[0].is_empty());
        assert_ne!(vectors[0], vectors[1]);
        assert_eq!(server.embed_requests(), 1);
    }

    #[test]
    fn test_health_check() {
        let server = MockOllamaServer::start();
        let embedder =
            OllamaEmbedder::new(&server.url(), "nomic-embed-text", Duration::from_secs(5))
                .unwrap();
        assert!(embedder.health_check());
    }

    #[test]
    fn test_unreachable_server_errors() {
        // Port 9 (discard) is almost never listening locally
        let embedder =
            OllamaEmbedder::new("http://127.0.0.1:9", "m", Duration::from_millis(500)).unwrap();
        assert!(embedder.embed(&["x".to_string()]).is_err());
        assert!(!embedder.health_check());
    }

    #[test]
    fn test_empty_batch_skips_request() {
        let embedder =
            OllamaEmbedder::new("http://127.0.0.1:9", "m", Duration::from_millis(500)).unwrap();
        assert!(embedder.embed(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let embedder =
            OllamaEmbedder::new("http://localhost:11434/", "m", Duration::from_secs(1)).unwrap();
        assert_eq!(embedder.host(), "http://localhost:11434");
    }
}
