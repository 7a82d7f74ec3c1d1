//! Gemini (Google AI) embedding provider

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, normalize_l2};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini embedding provider using the `batchEmbedContents` endpoint.
pub struct GeminiEmbeddingProvider {
    api_key: String,
    base_url: Option<String>,
    model: String,
    dimension: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiEmbeddingProvider")
            .field("base_url", &self.effective_base_url())
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

impl GeminiEmbeddingProvider {
    /// Create a provider with an explicit key, model, dimension and timeout.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: String,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(EmbedError::invalid_config("Gemini API key is empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(EmbedError::model_init)?;
        Ok(Self {
            api_key,
            base_url,
            model,
            dimension,
            client,
        })
    }

    /// Create a provider from configuration, reading the key from the
    /// environment variable named by `api_key_env`.
    pub fn from_config(config: &EmbedConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            EmbedError::invalid_config(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        Self::new(
            api_key,
            config.base_url.clone(),
            config.model_name().to_string(),
            config.dimension(),
            config.request_timeout(),
        )
    }

    fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// Model name without the `models/` prefix.
    pub fn api_model_name(&self) -> &str {
        self.model.strip_prefix("models/").unwrap_or(&self.model)
    }

    fn classify_status(status: StatusCode, body: &str) -> EmbedError {
        let reason = format!("Gemini API error {status}: {body}");
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            EmbedError::unavailable(reason)
        } else {
            EmbedError::failure(reason)
        }
    }

    fn classify_transport(err: reqwest::Error) -> EmbedError {
        if err.is_timeout() || err.is_connect() {
            EmbedError::unavailable(format!("Gemini request failed: {err}"))
        } else {
            EmbedError::failure(format!("Gemini request failed: {err}"))
        }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let result = self.embed_texts(&[text.to_string()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::failure("No embedding returned"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        let model_path = format!("models/{}", self.api_model_name());
        let payload = BatchEmbedContentsRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: model_path.clone(),
                    content: Content {
                        parts: [Part {
                            text: text.as_str(),
                        }],
                    },
                })
                .collect(),
        };
        let url = format!(
            "{}/v1beta/{}:batchEmbedContents",
            self.effective_base_url(),
            model_path
        );

        tracing::debug!("Requesting {} Gemini embeddings", texts.len());
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let parsed: BatchEmbedContentsResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::failure(format!("Failed to parse Gemini response: {e}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(EmbedError::failure(format!(
                "expected {} embeddings, Gemini returned {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for ContentEmbedding { mut values } in parsed.embeddings {
            if values.len() != self.dimension {
                return Err(EmbedError::DimensionMismatch {
                    expected: self.dimension,
                    actual: values.len(),
                });
            }
            normalize_l2(&mut values);
            embeddings.push(values);
        }

        Ok(EmbeddingResult {
            embeddings,
            dimension: self.dimension,
        })
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        self.api_model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const PATH: &str = "/v1beta/models/embedding-001:batchEmbedContents";

    fn provider(base_url: String, dimension: usize) -> GeminiEmbeddingProvider {
        GeminiEmbeddingProvider::new(
            "test-key".to_string(),
            Some(base_url),
            "models/embedding-001".to_string(),
            dimension,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_batch_request_and_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "requests": [
                    {"model": "models/embedding-001", "content": {"parts": [{"text": "first"}]}},
                    {"model": "models/embedding-001", "content": {"parts": [{"text": "second"}]}}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"embeddings":[{"values":[3.0,4.0]},{"values":[0.0,2.0]}]}"#)
            .create_async()
            .await;

        let provider = provider(server.url(), 2);
        let result = provider
            .embed_texts(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.len(), 2);
        assert!((result.embeddings[0][0] - 0.6).abs() < 1e-6);
        assert_eq!(result.embeddings[1], vec![0.0, 1.0]);
        assert_eq!(provider.model_name(), "embedding-001");
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(429)
            .with_body("quota")
            .create_async()
            .await;

        let err = provider(server.url(), 2)
            .embed_text("hello")
            .await
            .unwrap_err();
        assert!(err.is_transient(), "{err}");
    }

    #[tokio::test]
    async fn test_bad_request_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(400)
            .with_body("invalid argument")
            .create_async()
            .await;

        let err = provider(server.url(), 2)
            .embed_text("hello")
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::EmbeddingFailure { .. }));
    }

    #[tokio::test]
    async fn test_count_and_dimension_checks() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"embeddings":[{"values":[1.0,0.0,0.0]}]}"#)
            .create_async()
            .await;

        let provider = provider(server.url(), 2);
        let err = provider
            .embed_texts(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::EmbeddingFailure { .. }));

        let err = provider.embed_text("a").await.unwrap_err();
        assert!(matches!(
            err,
            EmbedError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_missing_key_rejected() {
        let config = EmbedConfig {
            api_key_env: "SIFT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..EmbedConfig::gemini("embedding-001")
        };
        assert!(matches!(
            GeminiEmbeddingProvider::from_config(&config),
            Err(EmbedError::InvalidConfig { .. })
        ));
    }
}
