//! CLI command definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(name = "carms-explorer")]
#[command(about = "Explore CaRMS residency programs with semantic search and a RAG agent")]
#[command(version)]
pub struct Cli {
    /// Enable verbose debug logging (default: info level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to a TOML config file (default: config.toml, then config.example.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize database schema and indexes
    Init {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Load a catalog export (disciplines, programs, descriptions) into the database
    Ingest {
        /// JSON catalog file, or a directory with the raw xlsx/csv/json exports
        path: PathBuf,
    },
    /// Rebuild every program chunk embedding
    Embed {
        /// Chunks per embedding batch (default: from config)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Concurrent batch workers (default: from config)
        #[arg(long)]
        workers: Option<usize>,
        /// Re-embed a single description instead of the whole corpus
        #[arg(long)]
        description_id: Option<i64>,
    },
    /// Semantic search over program descriptions
    Search {
        /// Free-text query
        query: String,
        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,
        /// Restrict to one discipline
        #[arg(long)]
        discipline_id: Option<i64>,
        /// Restrict to one school
        #[arg(long)]
        school_id: Option<i64>,
        /// Restrict to a site (case-insensitive substring)
        #[arg(long)]
        site: Option<String>,
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Ask a question answered from retrieved program descriptions
    Ask {
        /// The question
        question: String,
        /// Number of chunks to retrieve
        #[arg(short = 'k', long, default_value = "8")]
        top_k: usize,
        /// Print raw JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },
    /// List the tabular reports, or generate one by name
    Report {
        /// Report name (omit to list available reports)
        name: Option<String>,
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Start the HTTP API server
    Serve {
        /// Host to bind (default: from config)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (default: from config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Disable CORS
        #[arg(long)]
        no_cors: bool,
    },
    /// Show current configuration
    Config,
}
