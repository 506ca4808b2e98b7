/// API request handlers
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tracing::info;

use crate::agent::AgentService;
use crate::api::types::ApiResponse;
use crate::api::types::HealthResponse;
use crate::config::Capabilities;
use crate::database::Database;
use crate::errors::CarmsError;
use crate::rag::RagService;
use crate::rag::SearchService;

pub mod agent;
pub mod analytics;
pub mod catalog;
pub mod rag;
pub mod reports;
pub mod search;

pub use agent::*;
pub use analytics::*;
pub use catalog::*;
pub use rag::*;
pub use reports::*;
pub use search::*;

/// Shared application state
///
/// `rag` and `agent` are present exactly when the matching capability
/// resolved on at startup.
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub search: Arc<SearchService>,
    pub rag: Option<Arc<RagService>>,
    pub agent: Option<Arc<AgentService>>,
}

impl AppState {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            rag: self.rag.is_some(),
            agent: self.agent.is_some(),
        }
    }

    pub(crate) fn require_rag(&self) -> Result<Arc<RagService>, CarmsError> {
        self.rag.clone().ok_or_else(|| {
            CarmsError::FeatureDisabled("RAG not available. Configure an LLM key to enable.".to_string())
        })
    }

    pub(crate) fn require_agent(&self) -> Result<Arc<AgentService>, CarmsError> {
        self.agent.clone().ok_or_else(|| {
            CarmsError::FeatureDisabled(
                "AI agent not available. Configure an LLM key to enable.".to_string(),
            )
        })
    }
}

/// Health check handler
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    info!("GET /health");

    let connected = state.database.health_check().await;
    Json(ApiResponse::success(HealthResponse {
        status: if connected { "ok" } else { "degraded" }.to_string(),
        database: if connected { "connected" } else { "unavailable" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
