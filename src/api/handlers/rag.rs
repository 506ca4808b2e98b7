/// RAG-related API handlers
use axum::extract::State;
use axum::Json;
use tracing::info;

use super::AppState;
use crate::api::types::ApiResponse;
use crate::api::types::ApiResult;
use crate::api::types::RagAskRequest;
use crate::rag::RagResponse;

/// Grounded answer with cited sources
pub async fn rag_ask(
    State(state): State<AppState>,
    Json(req): Json<RagAskRequest>,
) -> ApiResult<RagResponse> {
    info!("POST /rag/ask: {}", req.question);

    let rag = state.require_rag()?;
    let response = rag.ask(&req.question, req.top_k).await?;
    Ok(Json(ApiResponse::success(response)))
}
