/// Tabular report handlers
use axum::extract::Path;
use axum::extract::State;
use axum::Json;
use tracing::info;

use super::AppState;
use crate::api::types::ApiResponse;
use crate::api::types::ApiResult;
use crate::reports::generate_report;
use crate::reports::list_reports;
use crate::reports::Report;
use crate::reports::ReportInfo;
use crate::reports::ReportKind;

pub async fn reports_list() -> Json<ApiResponse<Vec<ReportInfo>>> {
    info!("GET /reports");
    Json(ApiResponse::success(list_reports()))
}

pub async fn reports_generate(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Report> {
    info!("GET /reports/{}", name);
    let kind: ReportKind = name.parse()?;
    let report = generate_report(&state.database, kind).await?;
    Ok(Json(ApiResponse::success(report)))
}
