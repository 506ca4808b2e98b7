//! API route definitions

use axum::extract::DefaultBodyLimit;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;
use axum::Router;

use super::handlers;
use super::handlers::AppState;
use crate::agent::profile::MAX_UPLOAD_BYTES;

/// Create RESTful API router
///
/// RAG and agent routes are only registered when the matching service
/// exists; `/agent/status` is always present so clients can check availability.
pub fn api_routes(state: AppState) -> Router {
    let capabilities = state.capabilities();

    let mut router = Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Catalog
        .route("/disciplines", get(handlers::list_disciplines))
        .route("/schools", get(handlers::list_schools))
        .route("/programs", get(handlers::list_programs))
        .route("/programs/:id", get(handlers::get_program))
        // Search
        .route("/search", post(handlers::search_programs))
        // Analytics
        .route("/analytics/overview", get(handlers::analytics_overview))
        .route("/analytics/disciplines", get(handlers::analytics_disciplines))
        .route("/analytics/schools", get(handlers::analytics_schools))
        // Reports
        .route("/reports", get(handlers::reports_list))
        .route("/reports/:name", get(handlers::reports_generate))
        .route("/agent/status", get(handlers::agent_status));

    if capabilities.rag {
        router = router.route("/rag/ask", post(handlers::rag_ask));
    }

    if capabilities.agent {
        router = router
            .route(
                "/agent/upload",
                post(handlers::agent_upload)
                    // room for multipart framing around the largest accepted file
                    .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES * 2)),
            )
            .route("/agent/chat", post(handlers::agent_chat))
            .route("/agent/session/:id", delete(handlers::delete_agent_session));
    }

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use super::*;
    use crate::agent::AgentService;
    use crate::agent::CatalogTools;
    use crate::config::AppConfig;
    use crate::database::Database;
    use crate::embeddings::hash_embedder::HashEmbedder;
    use crate::errors::CarmsError;
    use crate::errors::UploadRejection;
    use crate::llm::ChatResponse;
    use crate::llm::ContentBlock;
    use crate::llm::LanguageModel;
    use crate::llm::StopReason;
    use crate::rag::SearchService;

    const BOUNDARY: &str = "carms-test-boundary";

    /// Replays queued chat replies in order
    struct ScriptedModel(Mutex<VecDeque<crate::Result<ChatResponse>>>);

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn chat(&self, _request: crate::llm::ChatRequest) -> crate::Result<ChatResponse> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CarmsError::LlmError("no scripted reply".to_string())))
        }
    }

    fn offline_state() -> AppState {
        let database = Database::connect_lazy(&AppConfig::default()).unwrap();
        let embedder = Arc::new(HashEmbedder::new(64));
        AppState {
            search: Arc::new(SearchService::new(database.clone(), embedder)),
            database,
            rag: None,
            agent: None,
        }
    }

    fn agent_state(replies: Vec<crate::Result<ChatResponse>>) -> AppState {
        let mut state = offline_state();
        let llm = Arc::new(ScriptedModel(Mutex::new(replies.into())));
        let tools = Arc::new(CatalogTools::new(
            state.database.clone(),
            Arc::clone(&state.search),
        ));
        state.agent = Some(Arc::new(AgentService::new(llm, tools, "extraction-model")));
        state
    }

    fn multipart_upload(content_type: &str, file: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"cv.pdf\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/agent/upload?session_id=s1")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn chat_request(message: &str) -> Request<Body> {
        Request::post("/agent/chat")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"message": message, "session_id": "s1"}).to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_agent_status_reports_unavailable() {
        let app = api_routes(offline_state());
        let response = app
            .oneshot(Request::get("/agent/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["available"], false);
    }

    #[tokio::test]
    async fn test_agent_status_reports_available() {
        let app = api_routes(agent_state(Vec::new()));
        let response = app
            .oneshot(Request::get("/agent/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["data"]["available"], true);
    }

    #[tokio::test]
    async fn test_disabled_capabilities_are_not_routed() {
        for (method, uri) in [
            ("POST", "/rag/ask"),
            ("POST", "/agent/chat"),
            ("POST", "/agent/upload"),
            ("DELETE", "/agent/session/abc"),
        ] {
            let app = api_routes(offline_state());
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap();
            let response = app.oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn test_upload_with_wrong_signature_is_rejected() {
        let app = api_routes(agent_state(Vec::new()));
        let response = app
            .oneshot(multipart_upload("application/pdf", b"GIF89a"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], UploadRejection::BadSignature.to_string());
    }

    #[tokio::test]
    async fn test_oversized_upload_gets_size_reason() {
        let mut file = crate::agent::profile::PDF_MAGIC.to_vec();
        file.resize(MAX_UPLOAD_BYTES + 1, b' ');

        let app = api_routes(agent_state(Vec::new()));
        let response = app
            .oneshot(multipart_upload("application/pdf", &file))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .contains("exceeds maximum size of 10 MB"));
    }

    #[tokio::test]
    async fn test_chat_streams_text_then_result() {
        let reply = ChatResponse {
            content: vec![ContentBlock::text("Prince George has a rural track.")],
            stop_reason: Some(StopReason::EndTurn),
        };
        let app = api_routes(agent_state(vec![Ok(reply)]));
        let response = app.oneshot(chat_request("rural programs?")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let body = body_text(response).await;
        let text_at = body.find("event: text").unwrap();
        let result_at = body.find("event: result").unwrap();
        assert!(text_at < result_at);
        assert!(body.contains("Prince George has a rural track."));
        assert!(!body.contains("event: error"));
    }

    #[tokio::test]
    async fn test_chat_failure_ends_with_error_event() {
        let app = api_routes(agent_state(vec![Err(CarmsError::LlmError(
            "upstream down".to_string(),
        ))]));
        let response = app.oneshot(chat_request("hello")).await.unwrap();

        let body = body_text(response).await;
        assert!(body.contains("event: error"));
        assert!(!body.contains("event: result"));
        assert!(!body.contains("upstream down"));
    }

    #[tokio::test]
    async fn test_chat_rejects_blank_message() {
        let app = api_routes(agent_state(Vec::new()));
        let response = app.oneshot(chat_request("   ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_report_registry_and_unknown_report() {
        let app = api_routes(offline_state());
        let response = app
            .clone()
            .oneshot(Request::get("/reports").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"][0]["name"], "discipline_summary");
        assert_eq!(json["data"][1]["name"], "program_gap_analysis");

        let response = app
            .oneshot(Request::get("/reports/school_coverage").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search_rejects_empty_query() {
        let app = api_routes(offline_state());
        let request = Request::post("/search")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"query": "   "}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("query"));
    }

    #[tokio::test]
    async fn test_search_rejects_oversized_top_k() {
        let app = api_routes(offline_state());
        let request = Request::post("/search")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"query": "rural", "top_k": 51}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_program_listing_rejects_bad_limit() {
        let app = api_routes(offline_state());
        let response = app
            .oneshot(
                Request::get("/programs?limit=0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
