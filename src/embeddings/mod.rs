//! Embeddings: chunking, providers and the offline rebuild of the vector store
//!
//! Providers:
//! - OpenAI-compatible `/embeddings` endpoints
//! - Ollama (local models over HTTP)
//! - A local sentence model run in-process through fastembed
//!
//! # Examples
//!
//! ```rust,no_run
//! use carms_explorer::config::AppConfig;
//! use carms_explorer::embeddings::EmbeddingService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let service = EmbeddingService::new(&config)?;
//!
//!     let embedding = service.embed_query("rural family medicine").await?;
//!     println!("Generated embedding with {} dimensions", embedding.len());
//!
//!     Ok(())
//! }
//! ```

pub mod backfill;
pub mod chunking;
pub mod client;
pub mod generator;
#[cfg(test)]
pub(crate) mod hash_embedder;
pub mod local;

use async_trait::async_trait;
pub use backfill::rebuild_embeddings;
pub use backfill::reembed_description;
pub use backfill::RebuildStats;
pub use chunking::TextChunk;
pub use chunking::TextChunker;
pub use client::EmbeddingClient;
pub use client::EmbeddingProvider;
pub use generator::EmbeddingService;

use crate::errors::Result;

/// Text-to-vector contract shared by every provider
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// One vector per input, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;
}

/// Configuration for embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub normalize: bool,
}

impl EmbeddingConfig {
    pub fn from_app_config(config: &crate::config::AppConfig) -> Result<Self> {
        let e = &config.embeddings;
        Ok(Self {
            provider: e.provider.parse()?,
            model: e.model.clone(),
            dimension: e.dimension,
            endpoint: e.endpoint.clone(),
            api_key: e.api_key.clone().filter(|k| !k.trim().is_empty()),
            normalize: e.normalize,
        })
    }
}

/// Scale to unit length in place; zero vectors are left untouched
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0; 3];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0; 3]);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_config_rejects_unknown_provider() {
        let mut config = crate::config::AppConfig::default();
        config.embeddings.provider = "word2vec".to_string();
        assert!(EmbeddingConfig::from_app_config(&config).is_err());
    }

    #[test]
    fn test_config_drops_blank_key() {
        let mut config = crate::config::AppConfig::default();
        config.embeddings.api_key = Some(String::new());
        let embedding = EmbeddingConfig::from_app_config(&config).unwrap();
        assert_eq!(embedding.provider, EmbeddingProvider::OpenAI);
        assert!(embedding.api_key.is_none());
    }
}
