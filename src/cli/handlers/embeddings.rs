//! Embedding rebuild handlers

use std::sync::Arc;

use crate::cli::output::print_info;
use crate::cli::output::print_rebuild_stats;
use crate::cli::output::print_success;
use crate::cli::output::print_warning;
use crate::config::AppConfig;
use crate::database::Database;
use crate::embeddings::backfill::RebuildOptions;
use crate::embeddings::rebuild_embeddings;
use crate::embeddings::reembed_description;
use crate::embeddings::EmbeddingService;
use crate::embeddings::TextChunker;
use crate::embeddings::TextEmbedder;
use crate::Result;

/// Rebuild all chunk embeddings, or one description's when an id is given
pub async fn handle_embed_command(
    db: &Database,
    config: &AppConfig,
    batch_size: Option<usize>,
    workers: Option<usize>,
    description_id: Option<i64>,
) -> Result<()> {
    db.verify_schema_or_error().await?;

    let embedder = Arc::new(EmbeddingService::new(config)?);
    let chunker = TextChunker::from_config(config)?;

    if let Some(id) = description_id {
        print_info(&format!("🔄 Re-embedding description {id}..."));
        let stored = reembed_description(db, embedder.as_ref(), &chunker, id).await?;
        print_success(&format!("Stored {stored} chunks for description {id}"));
        return Ok(());
    }

    let defaults = RebuildOptions::from_config(config);
    let options = RebuildOptions {
        batch_size: batch_size.unwrap_or(defaults.batch_size).max(1),
        workers: workers.unwrap_or(defaults.workers).max(1),
    };

    print_info(&format!(
        "🔄 Rebuilding embeddings with {} ({} dims), batch size {}, {} workers",
        config.embedding_model(),
        embedder.dimension(),
        options.batch_size,
        options.workers
    ));

    let stats = rebuild_embeddings(db, embedder, &chunker, options).await?;
    print_rebuild_stats(&stats);

    if stats.batches_failed > 0 {
        print_warning("Some batches failed; rerun `carms-explorer embed` to retry.");
    } else {
        print_success("Embeddings rebuilt");
    }
    Ok(())
}
