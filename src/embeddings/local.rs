//! In-process sentence encoder backed by `fastembed` (ONNX Runtime).
//!
//! Model weights are fetched on first load and cached on disk. Loading is
//! blocking and happens once per process, inside the embedding service's
//! lazy provider initialization.

use std::sync::Arc;

use fastembed::EmbeddingModel;
use fastembed::InitOptions;
use fastembed::TextEmbedding;
use tracing::info;

use crate::errors::CarmsError;
use crate::errors::Result;

pub const DEFAULT_LOCAL_MODEL: &str = "all-MiniLM-L6-v2";

/// Map a configured model name to a fastembed model and its output dimension
pub fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    let lowered = name.trim().to_ascii_lowercase();
    let short = lowered
        .trim_start_matches("sentence-transformers/")
        .trim_start_matches("baai/")
        .trim_start_matches("nomic-ai/");
    match short {
        "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
        "nomic-embed-text-v1.5" => Ok((EmbeddingModel::NomicEmbedTextV15, 768)),
        _ => Err(CarmsError::ConfigError(format!(
            "Unknown local embedding model '{name}' (expected all-MiniLM-L6-v2, \
             bge-small-en-v1.5, bge-base-en-v1.5 or nomic-embed-text-v1.5)"
        ))),
    }
}

/// Loaded sentence model; cheap to clone
#[derive(Clone)]
pub struct LocalEncoder {
    model: Arc<TextEmbedding>,
    dimension: usize,
}

impl LocalEncoder {
    /// Load the named model, downloading it if needed. Blocking.
    pub fn load(model_name: &str, dimension: usize) -> Result<Self> {
        let (model, native) = resolve_model(model_name)?;
        if native != dimension {
            return Err(CarmsError::DimensionMismatch {
                expected: dimension,
                actual: native,
            });
        }

        info!("Loading local sentence model {} ({} dimensions)", model_name, native);
        let embedding =
            TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(false))
                .map_err(|e| {
                    CarmsError::EmbeddingError(format!(
                        "Failed to load local model {model_name}: {e}"
                    ))
                })?;

        Ok(Self {
            model: Arc::new(embedding),
            dimension,
        })
    }

    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Encode on the blocking pool; one vector per input, in order
    pub async fn encode_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .map_err(|e| CarmsError::EmbeddingError(format!("Local encoder task failed: {e}")))?
            .map_err(|e| CarmsError::EmbeddingError(format!("Local encoding failed: {e}")))
    }
}
