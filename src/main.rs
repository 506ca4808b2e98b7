use anyhow::Context;
use carms_explorer::cli::handle_ask_command;
use carms_explorer::cli::handle_config_command;
use carms_explorer::cli::handle_embed_command;
use carms_explorer::cli::handle_ingest_command;
use carms_explorer::cli::handle_init_command;
use carms_explorer::cli::handle_report_command;
use carms_explorer::cli::handle_search_command;
use carms_explorer::cli::handle_serve_api;
use carms_explorer::cli::print_error;
use carms_explorer::cli::Cli;
use carms_explorer::cli::Commands;
use carms_explorer::config::AppConfig;
use carms_explorer::database::Database;
use carms_explorer::models::SearchFilters;
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load().context("Failed to load configuration")?,
    };

    // Initialize logging
    if cli.verbose {
        carms_explorer::logging::init_logging_with_level("debug")?;
    } else {
        carms_explorer::logging::init_logging_with_config(Some(&config))?;
    }
    info!("Configuration loaded successfully");

    // Commands that need no database connection
    match &cli.command {
        Commands::Config => return Ok(handle_config_command(&config)?),
        Commands::Serve {
            host,
            port,
            no_cors,
        } => {
            let host = host.clone().unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let cors = config.server.cors && !no_cors;
            return Ok(handle_serve_api(&config, host, port, cors).await?);
        }
        _ => {}
    }

    let db = Database::from_config(&config)
        .await
        .context("Failed to connect to the database")?;

    match cli.command {
        Commands::Init { force } => handle_init_command(&db, &config, force).await?,
        Commands::Ingest { path } => handle_ingest_command(&db, &path).await?,
        Commands::Report { name, json } => handle_report_command(&db, name.as_deref(), json).await?,
        Commands::Embed {
            batch_size,
            workers,
            description_id,
        } => handle_embed_command(&db, &config, batch_size, workers, description_id).await?,
        Commands::Search {
            query,
            top_k,
            discipline_id,
            school_id,
            site,
            json,
        } => {
            let filters = SearchFilters {
                discipline_id,
                school_id,
                site,
            };
            handle_search_command(&db, &config, &query, top_k, filters, json).await?;
        }
        Commands::Ask {
            question,
            top_k,
            json,
        } => handle_ask_command(&db, &config, &question, top_k, json).await?,
        Commands::Config | Commands::Serve { .. } => {}
    }

    Ok(())
}
