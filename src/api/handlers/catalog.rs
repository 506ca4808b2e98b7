/// Catalog browsing handlers
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::Json;
use tracing::info;

use super::AppState;
use crate::api::types::ApiError;
use crate::api::types::ApiResponse;
use crate::api::types::ApiResult;
use crate::errors::CarmsError;
use crate::models::DisciplineWithCount;
use crate::models::ProgramDetail;
use crate::models::ProgramListQuery;
use crate::models::ProgramSummary;
use crate::models::SchoolWithCount;

const MAX_PAGE_SIZE: i64 = 200;

/// List disciplines
pub async fn list_disciplines(State(state): State<AppState>) -> ApiResult<Vec<DisciplineWithCount>> {
    info!("GET /disciplines");
    let disciplines = state.database.list_disciplines().await?;
    Ok(Json(ApiResponse::success(disciplines)))
}

/// List schools
pub async fn list_schools(State(state): State<AppState>) -> ApiResult<Vec<SchoolWithCount>> {
    info!("GET /schools");
    let schools = state.database.list_schools().await?;
    Ok(Json(ApiResponse::success(schools)))
}

fn validate_paging(query: &ProgramListQuery) -> Result<(), ApiError> {
    if let Some(limit) = query.limit {
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ApiError::bad_request(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
    }
    if query.offset.is_some_and(|o| o < 0) {
        return Err(ApiError::bad_request("offset must be non-negative"));
    }
    Ok(())
}

/// List programs with optional filters
pub async fn list_programs(
    State(state): State<AppState>,
    Query(query): Query<ProgramListQuery>,
) -> ApiResult<Vec<ProgramSummary>> {
    info!("GET /programs {:?}", query);
    validate_paging(&query)?;
    let programs = state.database.list_programs(&query).await?;
    Ok(Json(ApiResponse::success(programs)))
}

/// Program with its full description
pub async fn get_program(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ProgramDetail> {
    info!("GET /programs/{}", id);
    let detail = state
        .database
        .get_program_detail(id)
        .await?
        .ok_or(CarmsError::ProgramNotFound(id))?;
    Ok(Json(ApiResponse::success(detail)))
}
