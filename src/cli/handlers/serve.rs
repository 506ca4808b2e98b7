//! API server handlers

use crate::api::serve_api;
use crate::AppConfig;
use crate::Result;

pub async fn handle_serve_api(config: &AppConfig, host: String, port: u16, cors: bool) -> Result<()> {
    let capabilities = config.capabilities();

    println!("🚀 Starting CaRMS Explorer API Server");
    println!("=====================================\n");
    println!("📍 Host: {host}");
    println!("🔌 Port: {port}");
    println!("🌐 CORS: {}", if cors { "Enabled" } else { "Disabled" });
    println!("📚 RAG: {}", if capabilities.rag { "Enabled" } else { "Disabled" });
    println!("🤖 Agent: {}", if capabilities.agent { "Enabled" } else { "Disabled" });
    println!();

    serve_api(config, host, port, cors).await
}
