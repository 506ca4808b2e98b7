//! Embedding API clients for the supported providers

use std::str::FromStr;

use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::local::LocalEncoder;
use crate::errors::CarmsError;
use crate::errors::Result;

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// `OpenAI`-compatible `/embeddings` API
    OpenAI,
    /// Ollama `/api/embeddings`
    Ollama,
    /// In-process sentence model via fastembed
    Local,
}

impl FromStr for EmbeddingProvider {
    type Err = CarmsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "local" => Ok(Self::Local),
            other => Err(CarmsError::ConfigError(format!(
                "Unknown embedding provider '{other}' (expected openai, ollama or local)"
            ))),
        }
    }
}

/// Maximum concurrent single-text requests for providers without a batch endpoint
const OLLAMA_CONCURRENCY: usize = 16;

/// Client for generating embeddings from a single provider
pub struct EmbeddingClient {
    provider: EmbeddingProvider,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    client: Client,
    local: Option<LocalEncoder>,
}

impl EmbeddingClient {
    pub fn new(
        provider: EmbeddingProvider,
        model: String,
        endpoint: String,
        api_key: Option<String>,
        dimension: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .pool_idle_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| CarmsError::HttpError(e.to_string()))?;

        let local = if provider == EmbeddingProvider::Local {
            Some(LocalEncoder::load(&model, dimension)?)
        } else {
            None
        };

        Ok(Self {
            provider,
            model,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            client,
            local,
        })
    }

    pub const fn provider(&self) -> EmbeddingProvider {
        self.provider
    }

    /// Generate embedding for a single text
    pub async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        match self.provider {
            EmbeddingProvider::OpenAI => {
                let mut batch = self.generate_batch_openai(vec![text]).await?;
                batch
                    .pop()
                    .ok_or_else(|| CarmsError::EmbeddingError("No embedding in response".to_string()))
            }
            EmbeddingProvider::Ollama => self.generate_ollama(text).await,
            EmbeddingProvider::Local => {
                let mut batch = self
                    .local_encoder()?
                    .encode_batch(vec![text.to_string()])
                    .await?;
                batch
                    .pop()
                    .ok_or_else(|| CarmsError::EmbeddingError("No embedding from local model".to_string()))
            }
        }
    }

    /// Generate embeddings for multiple texts, one vector per input in input order
    pub async fn generate_batch(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let embeddings = match self.provider {
            EmbeddingProvider::OpenAI => self.generate_batch_openai(texts).await?,
            EmbeddingProvider::Ollama => {
                // Ollama has no batch endpoint; `buffered` keeps input order
                use futures::stream;
                use futures::stream::StreamExt;

                let concurrency = texts.len().min(OLLAMA_CONCURRENCY);
                let owned: Vec<String> = texts.into_iter().map(str::to_string).collect();
                let results: Vec<Result<Vec<f32>>> = stream::iter(owned)
                    .map(|text| async move { self.generate_ollama(&text).await })
                    .buffered(concurrency)
                    .collect()
                    .await;

                results.into_iter().collect::<Result<Vec<_>>>()?
            }
            EmbeddingProvider::Local => {
                let owned = texts.into_iter().map(str::to_string).collect();
                self.local_encoder()?.encode_batch(owned).await?
            }
        };

        if embeddings.len() != expected {
            return Err(CarmsError::EmbeddingError(format!(
                "Provider returned {} embeddings for {} inputs",
                embeddings.len(),
                expected
            )));
        }
        Ok(embeddings)
    }

    fn local_encoder(&self) -> Result<&LocalEncoder> {
        self.local
            .as_ref()
            .ok_or_else(|| CarmsError::ConfigError("Local encoder not initialized".to_string()))
    }

    /// Generate embeddings in batch using `OpenAI` API
    async fn generate_batch_openai(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| CarmsError::ConfigError("OpenAI API key not provided".to_string()))?;

        #[derive(Serialize)]
        struct OpenAIBatchRequest<'a> {
            input: Vec<&'a str>,
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            index: usize,
            embedding: Vec<f32>,
        }

        let url = format!("{}/embeddings", self.endpoint);
        debug!("Calling OpenAI batch embeddings API: {} items", texts.len());

        let request = OpenAIBatchRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CarmsError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CarmsError::EmbeddingError(format!(
                "OpenAI API error ({status}): {error_text}"
            )));
        }

        let mut result: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| CarmsError::EmbeddingError(format!("Failed to parse response: {e}")))?;

        // The API may return items out of order
        result.data.sort_by_key(|d| d.index);
        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Generate embedding using Ollama API
    async fn generate_ollama(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.endpoint);
        debug!("Calling Ollama embeddings API: {}", url);

        let request = OllamaRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CarmsError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CarmsError::EmbeddingError(format!(
                "Ollama API error ({status}): {error_text}"
            )));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| CarmsError::EmbeddingError(format!("Failed to parse response: {e}")))?;

        Ok(result.embedding)
    }
}
