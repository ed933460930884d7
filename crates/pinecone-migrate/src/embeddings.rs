//! Text embedding providers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::connectors::common::{check_response, create_http_client, validate_url};
use crate::error::{Error, Result};

/// Model used when none is given.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Default OpenAI API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Turns texts into vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds each text with `model`. Output order matches input order.
    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI-compatible embeddings endpoint.
pub struct OpenAiEmbedder {
    api_key: String,
    base_url: String,
    client: Client,
}

impl OpenAiEmbedder {
    /// Creates an embedder for the public OpenAI API.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_OPENAI_BASE_URL)
    }

    /// Creates an embedder for any OpenAI-compatible server.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the URL is invalid.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl AsRef<str>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("OpenAI API key is empty".to_string()));
        }
        validate_url(base_url.as_ref())?;
        Ok(Self {
            api_key,
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            client: create_http_client(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Embedding {} texts with {}", texts.len(), model);

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                input: texts,
                model,
            })
            .send()
            .await?;
        let mut body: EmbeddingResponse = check_response(response, "OpenAI").await?.json().await?;

        if body.data.len() != texts.len() {
            error!(
                "Embedding service returned {} vectors for {} texts",
                body.data.len(),
                texts.len()
            );
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            )));
        }
        body.data.sort_by_key(|d| d.index);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_rejects_empty_key() {
        assert!(matches!(OpenAiEmbedder::new(" "), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_empty_input_skips_request() {
        let server = MockServer::start().await;
        let embedder = OpenAiEmbedder::with_base_url("sk-test", server.uri()).unwrap();
        let vectors = embedder.embed(&[], DEFAULT_EMBEDDING_MODEL).await.unwrap();
        assert!(vectors.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embed_orders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_json(json!({
                "input": ["first", "second"],
                "model": "text-embedding-ada-002"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                    {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
                ],
                "model": "text-embedding-ada-002"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::with_base_url("sk-test", server.uri()).unwrap();
        let vectors = embedder
            .embed(
                &["first".to_string(), "second".to_string()],
                DEFAULT_EMBEDDING_MODEL,
            )
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_count_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [1.0]}]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::with_base_url("sk-test", server.uri()).unwrap();
        let result = embedder
            .embed(&["a".to_string(), "b".to_string()], "m")
            .await;
        assert!(matches!(result, Err(Error::Embedding(_))));
    }

    #[tokio::test]
    async fn test_embed_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::with_base_url("sk-bad", server.uri()).unwrap();
        let result = embedder.embed(&["a".to_string()], "m").await;
        assert!(matches!(result, Err(Error::Authentication(_))));
    }
}
