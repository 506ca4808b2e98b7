/// Semantic search handler
use axum::extract::State;
use axum::Json;
use tracing::info;

use super::AppState;
use crate::api::types::ApiResponse;
use crate::api::types::ApiResult;
use crate::api::types::SearchRequest;
use crate::api::types::SearchResponse;

/// Nearest program chunks for a free-text query
pub async fn search_programs(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<SearchResponse> {
    info!("POST /search: {} (top_k={})", req.query, req.top_k);

    let results = state
        .search
        .search(&req.query, req.top_k, &req.filters())
        .await?;

    Ok(Json(ApiResponse::success(SearchResponse {
        count: results.len(),
        query: req.query,
        results,
    })))
}
