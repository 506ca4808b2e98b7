/// Conversational agent handlers
use std::convert::Infallible;

use axum::extract::Multipart;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::response::sse::Sse;
use axum::Json;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::info;
use tracing::warn;

use super::AppState;
use crate::agent::validate_message;
use crate::agent::AgentEvent;
use crate::api::types::AgentStatusResponse;
use crate::api::types::ApiError;
use crate::api::types::ApiResponse;
use crate::api::types::ApiResult;
use crate::api::types::ChatRequest;
use crate::api::types::SessionDeletedResponse;
use crate::api::types::UploadParams;
use crate::api::types::UploadResponse;

const DEFAULT_UPLOAD_NAME: &str = "upload.pdf";
const EVENT_BUFFER: usize = 32;

pub async fn agent_status(State(state): State<AppState>) -> Json<ApiResponse<AgentStatusResponse>> {
    info!("GET /agent/status");
    Json(ApiResponse::success(AgentStatusResponse {
        available: state.agent.is_some(),
    }))
}

/// Extract an applicant profile from an uploaded PDF
pub async fn agent_upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> ApiResult<UploadResponse> {
    let agent = state.require_agent()?;
    let session_id = params
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!("POST /agent/upload (session {})", session_id);

    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let filename = field
        .file_name()
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_UPLOAD_NAME)
        .to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;

    let profile = agent
        .upload_document(&session_id, &filename, content_type.as_deref(), &bytes)
        .await?;
    Ok(Json(ApiResponse::success(profile.into())))
}

fn to_sse(event: AgentEvent) -> Result<Event, Infallible> {
    let sse = Event::default().event(event.name());
    Ok(match sse.json_data(&event) {
        Ok(sse) => sse,
        Err(e) => {
            warn!("Failed to encode agent event: {}", e);
            Event::default().event("error").data(r#"{"error":"encoding failure"}"#)
        }
    })
}

/// Stream one agent turn as server-sent events
pub async fn agent_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let agent = state.require_agent()?;
    validate_message(&req.message)?;

    let session_id = req
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!("POST /agent/chat (session {})", session_id);

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    // The turn runs to completion even if the client goes away
    tokio::spawn(async move {
        agent.chat(&session_id, &req.message, tx).await;
    });

    let stream = ReceiverStream::new(rx).map(to_sse);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn delete_agent_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionDeletedResponse> {
    info!("DELETE /agent/session/{}", session_id);
    let agent = state.require_agent()?;
    agent.delete_session(&session_id).await;
    Ok(Json(ApiResponse::success(SessionDeletedResponse {
        status: "ok".to_string(),
    })))
}
