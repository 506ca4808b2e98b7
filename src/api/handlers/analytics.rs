/// Aggregate statistics handlers
use axum::extract::State;
use axum::Json;
use tracing::info;

use super::AppState;
use crate::api::types::ApiResponse;
use crate::api::types::ApiResult;
use crate::models::AnalyticsOverview;
use crate::models::DisciplineAnalytics;
use crate::models::SchoolAnalytics;

pub async fn analytics_overview(State(state): State<AppState>) -> ApiResult<AnalyticsOverview> {
    info!("GET /analytics/overview");
    let overview = state.database.analytics_overview().await?;
    Ok(Json(ApiResponse::success(overview)))
}

pub async fn analytics_disciplines(
    State(state): State<AppState>,
) -> ApiResult<Vec<DisciplineAnalytics>> {
    info!("GET /analytics/disciplines");
    let rows = state.database.programs_by_discipline(None).await?;
    Ok(Json(ApiResponse::success(rows)))
}

pub async fn analytics_schools(State(state): State<AppState>) -> ApiResult<Vec<SchoolAnalytics>> {
    info!("GET /analytics/schools");
    let rows = state.database.programs_by_school().await?;
    Ok(Json(ApiResponse::success(rows)))
}
