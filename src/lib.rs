pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod errors;
pub mod etl;
pub mod llm;
pub mod logging;
pub mod models;
pub mod rag;
pub mod reports;

pub use config::AppConfig;
pub use config::Capabilities;
pub use errors::*;
