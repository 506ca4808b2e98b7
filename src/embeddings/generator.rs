//! Embedding service: lazy provider initialization, normalization and dimension checks

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::info;

use super::client::EmbeddingClient;
use super::l2_normalize;
use super::EmbeddingConfig;
use super::TextEmbedder;
use crate::errors::CarmsError;
use crate::errors::Result;

/// Provider-backed embedder shared across the process
pub struct EmbeddingService {
    client: OnceCell<Arc<EmbeddingClient>>,
    config: EmbeddingConfig,
}

impl EmbeddingService {
    /// Create a new embedding service; the provider is initialized on first use
    pub fn new(config: &crate::config::AppConfig) -> Result<Self> {
        Ok(Self::from_config(EmbeddingConfig::from_app_config(config)?))
    }

    /// Create from custom config
    pub fn from_config(config: EmbeddingConfig) -> Self {
        Self {
            client: OnceCell::new(),
            config,
        }
    }

    pub const fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Whether the provider has been initialized yet
    pub fn is_loaded(&self) -> bool {
        self.client.initialized()
    }

    async fn client(&self) -> Result<&Arc<EmbeddingClient>> {
        self.client
            .get_or_try_init(|| async {
                info!(
                    "Initializing embedding provider {:?} (model: {}, dimension: {})",
                    self.config.provider, self.config.model, self.config.dimension
                );
                let config = self.config.clone();
                // A local model load reads (and may download) weights
                tokio::task::spawn_blocking(move || {
                    EmbeddingClient::new(
                        config.provider,
                        config.model,
                        config.endpoint,
                        config.api_key,
                        config.dimension,
                    )
                })
                .await
                .map_err(|e| {
                    CarmsError::EmbeddingError(format!("Embedding provider initialization failed: {e}"))
                })?
                .map(Arc::new)
            })
            .await
    }

    fn finish(&self, mut embedding: Vec<f32>) -> Result<Vec<f32>> {
        if embedding.len() != self.config.dimension {
            return Err(CarmsError::DimensionMismatch {
                expected: self.config.dimension,
                actual: embedding.len(),
            });
        }
        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if !norm.is_finite() || norm <= f32::EPSILON {
            return Err(CarmsError::EmbeddingError(
                "Provider returned a zero or non-finite vector".to_string(),
            ));
        }
        if self.config.normalize {
            l2_normalize(&mut embedding);
        }
        Ok(embedding)
    }

    /// One vector per input, same order
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.client().await?;
        let raw = client
            .generate_batch(texts.iter().map(String::as_str).collect())
            .await?;

        raw.into_iter().map(|e| self.finish(e)).collect()
    }

    /// Single-query convenience
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let client = self.client().await?;
        let raw = client.generate(text).await?;
        self.finish(raw)
    }
}

#[async_trait]
impl TextEmbedder for EmbeddingService {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Self::embed(self, texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Self::embed_query(self, text).await
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::cosine_similarity;
    use crate::embeddings::EmbeddingProvider;

    fn service(provider: EmbeddingProvider, model: &str, dimension: usize) -> EmbeddingService {
        EmbeddingService::from_config(EmbeddingConfig {
            provider,
            model: model.to_string(),
            dimension,
            endpoint: "http://127.0.0.1:9".to_string(),
            api_key: None,
            normalize: true,
        })
    }

    #[tokio::test]
    async fn test_provider_is_loaded_lazily() {
        // No key: initialization succeeds, the request itself fails
        let service = service(EmbeddingProvider::OpenAI, "text-embedding-3-small", 1536);
        assert!(!service.is_loaded());
        assert!(service.embed_query("anesthesiology").await.is_err());
        assert!(service.is_loaded());
    }

    #[tokio::test]
    async fn test_empty_batch_skips_provider() {
        let service = service(EmbeddingProvider::OpenAI, "text-embedding-3-small", 8);
        assert!(service.embed(&[]).await.unwrap().is_empty());
        assert!(!service.is_loaded());
    }

    #[tokio::test]
    async fn test_failed_local_load_is_an_error() {
        let service = service(EmbeddingProvider::Local, "word2vec", 384);
        assert!(matches!(
            service.embed_query("surgery").await,
            Err(CarmsError::ConfigError(_))
        ));
    }

    #[test]
    fn test_finish_rejects_zero_vector() {
        let service = service(EmbeddingProvider::OpenAI, "m", 4);
        assert!(matches!(
            service.finish(vec![0.0; 4]),
            Err(CarmsError::EmbeddingError(_))
        ));
        assert!(matches!(
            service.finish(vec![f32::NAN, 0.0, 0.0, 0.0]),
            Err(CarmsError::EmbeddingError(_))
        ));
    }

    #[test]
    fn test_finish_normalizes_and_checks_dimension() {
        let service = service(EmbeddingProvider::OpenAI, "m", 2);
        let v = service.finish(vec![3.0, 4.0]).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!(matches!(
            service.finish(vec![1.0; 3]),
            Err(CarmsError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[tokio::test]
    #[ignore = "Downloads the local sentence model"]
    async fn test_local_vectors_are_unit_and_semantic() {
        let service = service(EmbeddingProvider::Local, "all-MiniLM-L6-v2", 384);

        let punctuation = service.embed_query("???").await.unwrap();
        let norm: f32 = punctuation.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);

        let pediatrics = service.embed_query("pediatrics").await.unwrap();
        let children = service.embed_query("children's medicine").await.unwrap();
        let geology = service.embed_query("sedimentary rock formations").await.unwrap();
        assert!(cosine_similarity(&pediatrics, &children) > cosine_similarity(&pediatrics, &geology));
    }
}
