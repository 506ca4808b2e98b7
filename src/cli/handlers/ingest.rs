//! Catalog ingestion handler

use std::path::Path;

use tracing::info;

use crate::cli::output::print_info;
use crate::cli::output::print_staging_stats;
use crate::cli::output::print_success;
use crate::database::Database;
use crate::etl::stage_catalog;
use crate::etl::Catalog;
use crate::Result;

/// Load a catalog (JSON file or raw export directory) and upsert it
pub async fn handle_ingest_command(db: &Database, path: &Path) -> Result<()> {
    db.verify_schema_or_error().await?;

    print_info(&format!("📥 Reading catalog from {}", path.display()));
    let catalog = Catalog::from_path(path)?;
    info!(
        "Catalog parsed: {} disciplines, {} programs, {} descriptions",
        catalog.disciplines.len(),
        catalog.programs.len(),
        catalog.descriptions.len()
    );

    let stats = stage_catalog(db, &catalog).await?;
    print_staging_stats(&stats, catalog.skipped);
    println!();
    print_success("Catalog loaded. Run `carms-explorer embed` to refresh search vectors.");
    Ok(())
}
