//! API request and response types

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use crate::agent::ApplicantProfile;
use crate::errors::CarmsError;
use crate::models::SearchFilters;
use crate::models::SearchResult;
use crate::rag::pipeline::DEFAULT_RAG_TOP_K;
use crate::rag::retriever::DEFAULT_TOP_K;

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Error half of a handler result, rendered as an `ApiResponse` with a status
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<CarmsError> for ApiError {
    fn from(err: CarmsError) -> Self {
        let status = match &err {
            CarmsError::InvalidInput(_) | CarmsError::UploadRejected(_) => StatusCode::BAD_REQUEST,
            CarmsError::ProgramNotFound(_) | CarmsError::ReportNotFound(_) => StatusCode::NOT_FOUND,
            CarmsError::FeatureDisabled(_) => StatusCode::SERVICE_UNAVAILABLE,
            CarmsError::ExtractionFailed(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &err {
            // Upload reasons are shown verbatim
            CarmsError::UploadRejected(reason) => reason.to_string(),
            CarmsError::Database(_) | CarmsError::Io(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", err);
        }
        Self::new(status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`
    pub status: String,
    pub database: String,
    pub version: String,
}

/// Semantic search request
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub discipline_id: Option<i64>,
    #[serde(default)]
    pub school_id: Option<i64>,
    #[serde(default)]
    pub site: Option<String>,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl SearchRequest {
    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            discipline_id: self.discipline_id,
            school_id: self.school_id,
            site: self.site.clone().filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub count: usize,
}

/// RAG question
#[derive(Debug, Deserialize)]
pub struct RagAskRequest {
    pub question: String,
    #[serde(default = "default_rag_top_k")]
    pub top_k: usize,
}

fn default_rag_top_k() -> usize {
    DEFAULT_RAG_TOP_K
}

/// Agent chat turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentStatusResponse {
    pub available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionDeletedResponse {
    pub status: String,
}

/// Extracted profile plus the derived content flag
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub has_content: bool,
    #[serde(flatten)]
    pub profile: ApplicantProfile,
}

impl From<ApplicantProfile> for UploadResponse {
    fn from(profile: ApplicantProfile) -> Self {
        Self {
            has_content: profile.has_content(),
            profile,
        }
    }
}
