//! RAG question handler

use std::sync::Arc;

use crate::cli::output::print_rag_response;
use crate::config::AppConfig;
use crate::database::Database;
use crate::embeddings::EmbeddingService;
use crate::errors::CarmsError;
use crate::llm::AnthropicClient;
use crate::rag::RagService;
use crate::rag::SearchService;
use crate::Result;

pub async fn handle_ask_command(
    db: &Database,
    config: &AppConfig,
    question: &str,
    top_k: usize,
    json: bool,
) -> Result<()> {
    if !config.capabilities().rag {
        return Err(CarmsError::FeatureDisabled(
            "RAG is disabled. Set features.rag and llm.llm_key in the config.".to_string(),
        ));
    }

    let embedder = Arc::new(EmbeddingService::new(config)?);
    let search = Arc::new(SearchService::new(db.clone(), embedder));
    let llm = Arc::new(AnthropicClient::from_config(config)?);
    let rag = RagService::new(search, llm);

    let response = rag.ask(question, top_k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_rag_response(&response);
    }
    Ok(())
}
