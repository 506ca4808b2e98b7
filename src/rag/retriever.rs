//! Semantic retrieval over program chunks

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::DocumentRetriever;
use super::RetrievedDocument;
use super::SourceMetadata;
use crate::database::Database;
use crate::embeddings::TextEmbedder;
use crate::errors::CarmsError;
use crate::errors::Result;
use crate::models::SearchFilters;
use crate::models::SearchResult;

pub const MAX_QUERY_CHARS: usize = 500;
pub const DEFAULT_TOP_K: usize = 10;
pub const MAX_TOP_K: usize = 50;

/// Reject queries outside the accepted bounds
pub fn validate_search(query: &str, top_k: usize, max_top_k: usize) -> Result<()> {
    let chars = query.chars().count();
    if query.trim().is_empty() || chars > MAX_QUERY_CHARS {
        return Err(CarmsError::InvalidInput(format!(
            "query must be between 1 and {MAX_QUERY_CHARS} characters (got {chars})"
        )));
    }
    if top_k == 0 || top_k > max_top_k {
        return Err(CarmsError::InvalidInput(format!(
            "top_k must be between 1 and {max_top_k} (got {top_k})"
        )));
    }
    Ok(())
}

/// Embeds the query and ranks stored chunks by cosine distance
#[derive(Clone)]
pub struct SearchService {
    database: Database,
    embedder: Arc<dyn TextEmbedder>,
}

impl SearchService {
    pub fn new(database: Database, embedder: Arc<dyn TextEmbedder>) -> Self {
        Self { database, embedder }
    }

    pub const fn database(&self) -> &Database {
        &self.database
    }

    pub fn embedder(&self) -> Arc<dyn TextEmbedder> {
        Arc::clone(&self.embedder)
    }

    /// Top-K nearest chunks joined with program metadata; no match is an empty list
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        validate_search(query, top_k, MAX_TOP_K)?;
        debug!("Semantic search: {:?} (top_k={}, filters={:?})", query, top_k, filters);

        // Provider failures propagate; an empty list only ever means nothing matched
        let embedding = self.embedder.embed_query(query).await?;
        if embedding.len() != self.embedder.dimension() {
            return Err(CarmsError::DimensionMismatch {
                expected: self.embedder.dimension(),
                actual: embedding.len(),
            });
        }

        let results = self
            .database
            .semantic_search(&embedding, filters, top_k as i64)
            .await?;

        debug!("Semantic search returned {} results", results.len());
        Ok(results)
    }
}

/// [`DocumentRetriever`] view of the search service with a fixed result count
pub struct ProgramRetriever {
    search: Arc<SearchService>,
    top_k: usize,
}

impl ProgramRetriever {
    pub fn new(search: Arc<SearchService>, top_k: usize) -> Self {
        Self { search, top_k }
    }
}

impl From<SearchResult> for RetrievedDocument {
    fn from(r: SearchResult) -> Self {
        Self {
            text: r.chunk_text,
            metadata: SourceMetadata {
                program_id: r.program_id,
                program_name: r.program_name,
                discipline: r.discipline,
                school: r.school,
                site: r.site,
                similarity: r.similarity,
            },
        }
    }
}

#[async_trait]
impl DocumentRetriever for ProgramRetriever {
    async fn fetch(&self, query: &str) -> Result<Vec<RetrievedDocument>> {
        let results = self
            .search
            .search(query, self.top_k, &SearchFilters::default())
            .await?;
        Ok(results.into_iter().map(RetrievedDocument::from).collect())
    }
}
