//! Database initialization handler

use crate::cli::output::print_info;
use crate::cli::output::print_success;
use crate::cli::output::print_warning;
use crate::config::AppConfig;
use crate::database::Database;
use crate::Result;

/// Handle database initialization command
pub async fn handle_init_command(db: &Database, config: &AppConfig, force: bool) -> Result<()> {
    if !force {
        print_warning("This will create the catalog tables and the pgvector index.");
        print_warning("This operation is safe - it uses CREATE IF NOT EXISTS.");
        println!("\nUse --force to proceed.");
        return Ok(());
    }

    let dimension = config.embedding_dimension();
    print_info(&format!(
        "🗄️  Initializing database (embedding dimension {dimension})..."
    ));

    if let Err(e) = db.init_schema(dimension).await {
        if e.to_string().contains("vector") || e.to_string().contains("extension") {
            print_warning(&format!("Could not enable pgvector extension: {e}"));
            println!("  Run as a superuser: CREATE EXTENSION IF NOT EXISTS vector;");
        }
        return Err(e);
    }

    print_success("Tables, indexes and vector column created");
    println!();
    print_info("Next steps:");
    println!("   carms-explorer ingest <catalog.json>");
    println!("   carms-explorer embed");
    Ok(())
}
