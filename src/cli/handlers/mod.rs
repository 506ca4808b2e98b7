//! CLI command handlers module
//!
//! This module is organized by functional domains:
//! - init: Database schema initialization
//! - ingest: Catalog loading
//! - embeddings: Chunk embedding rebuilds
//! - search: Semantic search
//! - rag: RAG questions
//! - reports: Tabular reports
//! - serve: API server
//! - info: Configuration display

pub mod embeddings;
pub mod info;
pub mod ingest;
pub mod init;
pub mod rag;
pub mod reports;
pub mod search;
pub mod serve;

pub use embeddings::*;
pub use info::*;
pub use ingest::*;
pub use init::*;
pub use rag::*;
pub use reports::*;
pub use search::*;
pub use serve::*;
