//! Semantic search handler

use std::sync::Arc;

use crate::cli::output::print_search_header;
use crate::cli::output::print_search_results;
use crate::config::AppConfig;
use crate::database::Database;
use crate::embeddings::EmbeddingService;
use crate::models::SearchFilters;
use crate::rag::SearchService;
use crate::Result;

pub async fn handle_search_command(
    db: &Database,
    config: &AppConfig,
    query: &str,
    top_k: usize,
    filters: SearchFilters,
    json: bool,
) -> Result<()> {
    let embedder = Arc::new(EmbeddingService::new(config)?);
    let search = SearchService::new(db.clone(), embedder);

    let results = search.search(query, top_k, &filters).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_search_header(query, top_k);
        print_search_results(&results);
    }
    Ok(())
}
