//! HTTP server implementation

use std::sync::Arc;

use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing::warn;

use crate::agent::AgentService;
use crate::agent::CatalogTools;
use crate::api::handlers::AppState;
use crate::api::routes;
use crate::config::AppConfig;
use crate::database::Database;
use crate::embeddings::EmbeddingService;
use crate::llm::AnthropicClient;
use crate::llm::LanguageModel;
use crate::rag::RagService;
use crate::rag::SearchService;
use crate::Result;

/// Wire services according to the resolved capabilities
pub async fn build_state(config: &AppConfig) -> Result<AppState> {
    let database = Database::from_config(config).await?;
    if let Err(e) = database.verify_schema_or_error().await {
        warn!("Schema check failed: {}", e);
    }

    let embedder = Arc::new(EmbeddingService::new(config)?);
    let search = Arc::new(SearchService::new(database.clone(), embedder));

    let capabilities = config.capabilities();
    let llm: Option<Arc<dyn LanguageModel>> = if capabilities.rag || capabilities.agent {
        Some(Arc::new(AnthropicClient::from_config(config)?))
    } else {
        None
    };

    let rag = match (&llm, capabilities.rag) {
        (Some(llm), true) => Some(Arc::new(RagService::new(
            Arc::clone(&search),
            Arc::clone(llm),
        ))),
        _ => None,
    };

    let agent = match (&llm, capabilities.agent) {
        (Some(llm), true) => {
            let tools = Arc::new(CatalogTools::new(database.clone(), Arc::clone(&search)));
            Some(Arc::new(AgentService::new(
                Arc::clone(llm),
                tools,
                config.llm.extraction_model.clone(),
            )))
        }
        _ => None,
    };

    info!(
        "Capabilities: rag={} agent={}",
        rag.is_some(),
        agent.is_some()
    );

    Ok(AppState {
        database,
        search,
        rag,
        agent,
    })
}

/// Start the API server
pub async fn serve_api(config: &AppConfig, host: String, port: u16, enable_cors: bool) -> Result<()> {
    info!("🚀 Starting CaRMS Explorer API server...");

    let state = build_state(config).await?;
    let capabilities = state.capabilities();

    let mut app: Router = routes::api_routes(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if enable_cors {
        info!("✅ CORS enabled");
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🌐 API server listening on http://{}", addr);
    info!("Available endpoints:");
    info!("  GET    /health                 - Health check");
    info!("  GET    /disciplines            - Disciplines with program counts");
    info!("  GET    /schools                - Schools with program counts");
    info!("  GET    /programs               - List programs");
    info!("  GET    /programs/:id           - Program detail");
    info!("  POST   /search                 - Semantic search");
    info!("  GET    /analytics/*            - Aggregate statistics");
    info!("  GET    /reports[/:name]        - Tabular reports");
    info!("  GET    /agent/status           - Agent availability");
    if capabilities.rag {
        info!("  POST   /rag/ask                - Grounded answer");
    }
    if capabilities.agent {
        info!("  POST   /agent/upload           - Applicant profile upload");
        info!("  POST   /agent/chat             - Agent chat (SSE)");
        info!("  DELETE /agent/session/:id      - Forget a session");
    }

    axum::serve(listener, app).await?;

    Ok(())
}
