//! Retry wrapper with exponential backoff for transient provider failures.

use crate::config::RetryConfig;
use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Wraps a provider and retries calls that fail with a transient error.
///
/// Permanent errors are returned immediately. After `max_retries` retries
/// the last transient error is returned to the caller.
#[derive(Debug, Clone)]
pub struct RetryingProvider<P> {
    inner: P,
    config: RetryConfig,
}

impl<P: EmbeddingProvider> RetryingProvider<P> {
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    async fn with_retries<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.config.initial_backoff();
        let mut retries = 0;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retries < self.config.max_retries => {
                    retries += 1;
                    tracing::warn!(
                        "{} on {} failed ({}), retry {}/{} in {:?}",
                        operation,
                        self.inner.provider_name(),
                        e,
                        retries,
                        self.config.max_retries,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = next_backoff(backoff, self.config.max_backoff());
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for RetryingProvider<P> {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.with_retries("embed_text", || self.inner.embed_text(text))
            .await
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        self.with_retries("embed_texts", || self.inner.embed_texts(texts))
            .await
    }

    fn embedding_dimension(&self) -> usize {
        self.inner.embedding_dimension()
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbedError;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given error a fixed number of times, then succeeds.
    struct Flaky {
        failures: u32,
        transient: bool,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, transient: bool) -> Self {
            Self {
                failures,
                transient,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for Flaky {
        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.transient {
                    Err(EmbedError::unavailable("503"))
                } else {
                    Err(EmbedError::failure("400"))
                }
            } else {
                Ok(vec![1.0])
            }
        }

        async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
            let mut embeddings = Vec::new();
            for text in texts {
                embeddings.push(self.embed_text(text).await?);
            }
            Ok(EmbeddingResult::new(embeddings))
        }

        fn embedding_dimension(&self) -> usize {
            1
        }

        fn provider_name(&self) -> &str {
            "flaky"
        }

        fn model_name(&self) -> &str {
            "flaky-model"
        }
    }

    fn fast_retries(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let provider = RetryingProvider::new(Flaky::new(2, true), fast_retries(3));
        assert_eq!(provider.embed_text("x").await.unwrap(), vec![1.0]);
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let provider = RetryingProvider::new(Flaky::new(10, true), fast_retries(2));
        let err = provider.embed_text("x").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failures_are_not_retried() {
        let provider = RetryingProvider::new(Flaky::new(1, false), fast_retries(3));
        let err = provider.embed_text("x").await.unwrap_err();
        assert!(matches!(err, EmbedError::EmbeddingFailure { .. }));
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let max = Duration::from_millis(300);
        assert_eq!(
            next_backoff(Duration::from_millis(100), max),
            Duration::from_millis(200)
        );
        assert_eq!(next_backoff(Duration::from_millis(200), max), max);
    }

    #[test]
    fn test_identity_is_delegated() {
        let provider = RetryingProvider::new(Flaky::new(0, true), fast_retries(0));
        assert_eq!(provider.identity().to_string(), "flaky/flaky-model (1d)");
    }
}
