//! Retrieval-augmented question answering over program descriptions
//!
//! - Semantic retrieval of description chunks ([`SearchService`])
//! - Context stuffing in retrieval order ([`ContextAssembler`])
//! - Grounded answer generation through a [`LanguageModel`](crate::llm::LanguageModel)
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use carms_explorer::config::AppConfig;
//! use carms_explorer::database::Database;
//! use carms_explorer::embeddings::EmbeddingService;
//! use carms_explorer::llm::AnthropicClient;
//! use carms_explorer::rag::RagService;
//! use carms_explorer::rag::SearchService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let db = Database::from_config(&config).await?;
//!     let search = Arc::new(SearchService::new(db, Arc::new(EmbeddingService::new(&config)?)));
//!     let rag = RagService::new(search, Arc::new(AnthropicClient::from_config(&config)?));
//!
//!     let response = rag.ask("Which programs emphasize rural medicine?", 8).await?;
//!     println!("{}", response.answer);
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod pipeline;
pub mod retriever;

use async_trait::async_trait;
pub use context::ContextAssembler;
pub use pipeline::RagResponse;
pub use pipeline::RagService;
pub use retriever::ProgramRetriever;
pub use retriever::SearchService;
use serde::Serialize;

use crate::errors::Result;

/// Program fields carried alongside a retrieved chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceMetadata {
    pub program_id: i64,
    pub program_name: String,
    pub discipline: String,
    pub school: String,
    pub site: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    pub text: String,
    pub metadata: SourceMetadata,
}

/// One cited source in a RAG answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagSource {
    pub program_id: i64,
    pub program_name: String,
    pub discipline: String,
    pub school: String,
    pub site: String,
    pub similarity: f64,
    pub excerpt: String,
}

/// Anything that can return ranked documents for a question
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    async fn fetch(&self, query: &str) -> Result<Vec<RetrievedDocument>>;
}
