//! Conversational agent over the program catalog
//!
//! Each chat turn runs a bounded tool-calling loop against the chat model
//! and reports progress as [`AgentEvent`]s over a channel. Conversation
//! history lives behind an opaque resume token: the agent only remembers
//! `session id -> resume token`, and a failed turn drops that mapping so the
//! next message starts a fresh conversation.
//!
//! Session state machine: no profile, then a profile after a relevant
//! upload, back to no profile after a session delete or an irrelevant or
//! failed upload.

pub mod profile;
pub mod session;
pub mod tools;

use std::sync::Arc;

pub use profile::format_profile_context;
pub use profile::parse_profile_with_defaults;
pub use profile::validate_upload;
pub use profile::ApplicantProfile;
pub use profile::ProfileExtractor;
use serde::Serialize;
pub use session::InMemorySessionStore;
pub use session::SessionStore;
use tokio::sync::mpsc;
pub use tools::CatalogTools;
pub use tools::ToolExecutor;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::errors::CarmsError;
use crate::errors::Result;
use crate::llm::prompts::AGENT_SYSTEM_PROMPT;
use crate::llm::ChatRequest;
use crate::llm::ContentBlock;
use crate::llm::LanguageModel;
use crate::llm::Message;
use crate::llm::Role;

pub const DEFAULT_MAX_TURNS: usize = 10;
pub const MAX_MESSAGE_CHARS: usize = 10_000;
pub const AGENT_ERROR_MESSAGE: &str = "An error occurred processing your request.";

/// Progress notifications for one chat turn, in emission order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AgentEvent {
    ToolUse {
        tool: String,
        input: serde_json::Value,
    },
    Text {
        text: String,
    },
    Result {
        session_id: String,
        is_error: bool,
    },
    Error {
        error: String,
    },
}

impl AgentEvent {
    /// SSE event name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ToolUse { .. } => "tool_use",
            Self::Text { .. } => "text",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Error { .. })
    }
}

pub fn validate_message(message: &str) -> Result<()> {
    let chars = message.chars().count();
    if message.trim().is_empty() || chars > MAX_MESSAGE_CHARS {
        return Err(CarmsError::InvalidInput(format!(
            "message must be between 1 and {MAX_MESSAGE_CHARS} characters (got {chars})"
        )));
    }
    Ok(())
}

pub struct AgentService {
    llm: Arc<dyn LanguageModel>,
    tools: Arc<dyn ToolExecutor>,
    extractor: ProfileExtractor,
    /// session id -> resume token
    sessions: Arc<dyn SessionStore<String>>,
    /// resume token -> transcript
    transcripts: Arc<dyn SessionStore<Vec<Message>>>,
    profiles: Arc<dyn SessionStore<ApplicantProfile>>,
    max_turns: usize,
}

impl AgentService {
    /// Agent with in-memory session state
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        tools: Arc<dyn ToolExecutor>,
        extraction_model: impl Into<String>,
    ) -> Self {
        Self {
            extractor: ProfileExtractor::new(Arc::clone(&llm), extraction_model),
            llm,
            tools,
            sessions: Arc::new(InMemorySessionStore::new()),
            transcripts: Arc::new(InMemorySessionStore::new()),
            profiles: Arc::new(InMemorySessionStore::new()),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    #[must_use]
    pub fn with_stores(
        mut self,
        sessions: Arc<dyn SessionStore<String>>,
        transcripts: Arc<dyn SessionStore<Vec<Message>>>,
        profiles: Arc<dyn SessionStore<ApplicantProfile>>,
    ) -> Self {
        self.sessions = sessions;
        self.transcripts = transcripts;
        self.profiles = profiles;
        self
    }

    #[must_use]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub async fn profile(&self, session_id: &str) -> Option<ApplicantProfile> {
        self.profiles.get(session_id).await
    }

    /// Validate, extract and store a profile for `session_id`
    ///
    /// A rejected upload changes nothing. A failed extraction clears any
    /// existing profile. An irrelevant document is stored but carries no
    /// content, so it is never prepended.
    pub async fn upload_document(
        &self,
        session_id: &str,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<ApplicantProfile> {
        validate_upload(content_type, bytes)?;
        info!(
            "Extracting applicant profile from {} ({} bytes) for session {}",
            filename,
            bytes.len(),
            session_id
        );

        match self.extractor.extract(bytes, filename, session_id).await {
            Ok(profile) => {
                if !profile.is_relevant {
                    info!("Upload {} judged irrelevant for session {}", filename, session_id);
                }
                self.profiles.put(session_id, profile.clone()).await;
                Ok(profile)
            }
            Err(e) => {
                self.profiles.delete(session_id).await;
                Err(e)
            }
        }
    }

    /// Forget the resume mapping, its transcript and any profile
    pub async fn delete_session(&self, session_id: &str) {
        if let Some(token) = self.sessions.delete(session_id).await {
            self.transcripts.delete(&token).await;
        }
        self.profiles.delete(session_id).await;
    }

    /// Message as sent to the model, with the profile block when it has content
    pub async fn compose_message(&self, session_id: &str, message: &str) -> String {
        match self.profiles.get(session_id).await {
            Some(profile) if profile.has_content() => {
                format!("{}\n\n{}", format_profile_context(&profile), message)
            }
            _ => message.to_string(),
        }
    }

    /// Run one chat turn, emitting events until a `result` or `error` event
    pub async fn chat(&self, session_id: &str, message: &str, events: mpsc::Sender<AgentEvent>) {
        match self.run_turn(session_id, message, &events).await {
            Ok(is_error) => {
                let _ = events
                    .send(AgentEvent::Result {
                        session_id: session_id.to_string(),
                        is_error,
                    })
                    .await;
            }
            Err(e) => {
                error!("Agent error for session {}: {}", session_id, e);
                if let Some(token) = self.sessions.delete(session_id).await {
                    self.transcripts.delete(&token).await;
                }
                let _ = events
                    .send(AgentEvent::Error {
                        error: AGENT_ERROR_MESSAGE.to_string(),
                    })
                    .await;
            }
        }
    }

    /// `Ok(true)` when the turn limit ran out before a final reply
    async fn run_turn(
        &self,
        session_id: &str,
        message: &str,
        events: &mpsc::Sender<AgentEvent>,
    ) -> Result<bool> {
        let previous_token = self.sessions.get(session_id).await;
        let mut transcript = match &previous_token {
            Some(token) => self.transcripts.get(token).await.unwrap_or_default(),
            None => Vec::new(),
        };

        let prompt = self.compose_message(session_id, message).await;
        transcript.push(Message::user(prompt));

        let definitions = self.tools.definitions();
        let mut finished = false;

        for turn in 1..=self.max_turns {
            let response = self
                .llm
                .chat(ChatRequest {
                    system: Some(AGENT_SYSTEM_PROMPT.to_string()),
                    messages: transcript.clone(),
                    tools: definitions.clone(),
                    ..Default::default()
                })
                .await?;

            for block in &response.content {
                let event = match block {
                    ContentBlock::ToolUse { name, input, .. } => AgentEvent::ToolUse {
                        tool: name.clone(),
                        input: input.clone(),
                    },
                    ContentBlock::Text { text } if !text.is_empty() => {
                        AgentEvent::Text { text: text.clone() }
                    }
                    _ => continue,
                };
                let _ = events.send(event).await;
            }

            let calls: Vec<(String, String, serde_json::Value)> = response
                .tool_calls()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();
            // Block kinds we cannot round-trip are dropped from the history
            transcript.push(Message::assistant(
                response
                    .content
                    .into_iter()
                    .filter(|block| !matches!(block, ContentBlock::Other))
                    .collect(),
            ));

            if calls.is_empty() {
                finished = true;
                break;
            }

            info!(
                "Tool turn {}/{}: {} tool call(s)",
                turn,
                self.max_turns,
                calls.len()
            );

            let mut results = Vec::with_capacity(calls.len());
            for (id, name, input) in calls {
                let (content, is_error) = match self.tools.execute(&name, &input).await {
                    Ok(output) => (output, false),
                    Err(e) => {
                        warn!("Tool {} failed: {}", name, e);
                        (format!("Tool error: {e}"), true)
                    }
                };
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id,
                    content,
                    is_error,
                });
            }
            transcript.push(Message {
                role: Role::User,
                content: results,
            });
        }

        if !finished {
            warn!(
                "Session {} hit the {}-turn limit without a final reply",
                session_id, self.max_turns
            );
        }

        // A disconnected client never learns the new token, so it is not kept
        if events.is_closed() {
            info!("Client for session {} disconnected; discarding turn", session_id);
            return Ok(!finished);
        }

        let token = uuid::Uuid::new_v4().to_string();
        self.transcripts.put(&token, transcript).await;
        self.sessions.put(session_id, token).await;
        if let Some(old) = previous_token {
            self.transcripts.delete(&old).await;
        }

        Ok(!finished)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use serde_json::Value;

    use super::*;
    use crate::llm::ChatResponse;
    use crate::llm::StopReason;
    use crate::llm::ToolDefinition;

    /// Replays queued replies and records every request
    #[derive(Default)]
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<ChatResponse>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        fn with(replies: Vec<Result<ChatResponse>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(text_reply("(no more replies)")))
        }
    }

    fn text_reply(text: &str) -> ChatResponse {
        ChatResponse {
            content: vec![ContentBlock::text(text)],
            stop_reason: Some(StopReason::EndTurn),
        }
    }

    fn tool_reply(id: &str, name: &str, input: Value) -> ChatResponse {
        ChatResponse {
            content: vec![
                ContentBlock::text("Let me look that up."),
                ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input,
                },
            ],
            stop_reason: Some(StopReason::ToolUse),
        }
    }

    struct EchoTools;

    #[async_trait]
    impl ToolExecutor for EchoTools {
        fn definitions(&self) -> Vec<ToolDefinition> {
            tools::catalog_tool_definitions()
        }

        async fn execute(&self, name: &str, input: &Value) -> Result<String> {
            match name {
                "list_schools" => Ok(r#"[{"id": 1, "name": "UBC", "program_count": 3}]"#.to_string()),
                _ => Err(CarmsError::InvalidInput(format!("bad call {name} {input}"))),
            }
        }
    }

    fn agent(model: Arc<ScriptedModel>) -> AgentService {
        AgentService::new(model, Arc::new(EchoTools), "extraction-model")
    }

    async fn run(agent: &AgentService, session: &str, message: &str) -> Vec<AgentEvent> {
        let (tx, mut rx) = mpsc::channel(32);
        agent.chat(session, message, tx).await;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_plain_reply_emits_text_then_result() {
        let model = ScriptedModel::with(vec![Ok(text_reply("Hello!"))]);
        let events = run(&agent(model), "s1", "hi").await;
        assert_eq!(
            events,
            vec![
                AgentEvent::Text {
                    text: "Hello!".to_string()
                },
                AgentEvent::Result {
                    session_id: "s1".to_string(),
                    is_error: false
                }
            ]
        );
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let model = ScriptedModel::with(vec![
            Ok(tool_reply("t1", "list_schools", json!({}))),
            Ok(text_reply("UBC has 3 programs.")),
        ]);
        let agent = agent(Arc::clone(&model));
        let events = run(&agent, "s1", "Which schools?").await;

        let names: Vec<&str> = events.iter().map(AgentEvent::name).collect();
        assert_eq!(names, ["text", "tool_use", "text", "result"]);

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.len(), 7);
        assert!(requests[0].system.as_deref().is_some());
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(matches!(
            &last.content[0],
            ContentBlock::ToolResult { tool_use_id, is_error: false, .. } if tool_use_id == "t1"
        ));
    }

    #[tokio::test]
    async fn test_tool_failure_is_reported_to_model_not_client() {
        let model = ScriptedModel::with(vec![
            Ok(tool_reply("t1", "get_program_detail", json!({"program_id": "x"}))),
            Ok(text_reply("Sorry, I could not find that.")),
        ]);
        let agent = agent(Arc::clone(&model));
        let events = run(&agent, "s1", "detail please").await;

        assert!(matches!(
            events.last(),
            Some(AgentEvent::Result { is_error: false, .. })
        ));
        let requests = model.requests.lock().unwrap();
        assert!(matches!(
            &requests[1].messages.last().unwrap().content[0],
            ContentBlock::ToolResult { is_error: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_history_resumes_across_turns() {
        let model = ScriptedModel::with(vec![Ok(text_reply("first")), Ok(text_reply("second"))]);
        let agent = agent(Arc::clone(&model));
        run(&agent, "s1", "one").await;
        run(&agent, "s1", "two").await;

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].messages.len(), 1);
        // user, assistant, user
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[1].messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_error_emits_terminal_event_and_resets_session() {
        let model = ScriptedModel::with(vec![
            Ok(text_reply("first")),
            Err(CarmsError::LlmError("boom".to_string())),
            Ok(text_reply("fresh")),
        ]);
        let agent = agent(Arc::clone(&model));
        run(&agent, "s1", "one").await;

        let events = run(&agent, "s1", "two").await;
        assert_eq!(
            events,
            vec![AgentEvent::Error {
                error: AGENT_ERROR_MESSAGE.to_string()
            }]
        );
        assert!(agent.sessions.get("s1").await.is_none());

        run(&agent, "s1", "three").await;
        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[2].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_turn_limit_marks_result_as_error() {
        let replies = (0..3)
            .map(|i| Ok(tool_reply(&format!("t{i}"), "list_schools", json!({}))))
            .collect();
        let model = ScriptedModel::with(replies);
        let agent = agent(Arc::clone(&model)).with_max_turns(3);
        let events = run(&agent, "s1", "loop forever").await;

        assert_eq!(model.requests.lock().unwrap().len(), 3);
        assert!(matches!(
            events.last(),
            Some(AgentEvent::Result { is_error: true, .. })
        ));
    }

    fn profile(relevant: bool) -> ApplicantProfile {
        ApplicantProfile {
            session_id: "s1".to_string(),
            filename: "cv.pdf".to_string(),
            is_relevant: relevant,
            training_interests: vec!["rural medicine".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_profile_with_content_is_prepended() {
        let model = ScriptedModel::with(vec![Ok(text_reply("ok"))]);
        let agent = agent(Arc::clone(&model));
        agent.profiles.put("s1", profile(true)).await;
        run(&agent, "s1", "Recommend programs").await;

        let requests = model.requests.lock().unwrap();
        let ContentBlock::Text { text } = &requests[0].messages[0].content[0] else {
            panic!("expected text block");
        };
        assert!(text.starts_with("[APPLICANT PROFILE: cv.pdf]"));
        assert!(text.ends_with("[END PROFILE]\n\nRecommend programs"));
    }

    #[tokio::test]
    async fn test_irrelevant_profile_is_not_prepended() {
        let agent = agent(ScriptedModel::with(Vec::new()));
        agent.profiles.put("s1", profile(false)).await;
        assert_eq!(agent.compose_message("s1", "hello").await, "hello");
    }

    #[tokio::test]
    async fn test_upload_rejection_makes_no_model_call() {
        let model = ScriptedModel::with(Vec::new());
        let agent = agent(Arc::clone(&model));
        let err = agent
            .upload_document("s1", "x.pdf", Some("application/pdf"), b"PK\x03\x04")
            .await
            .unwrap_err();
        assert!(matches!(err, CarmsError::UploadRejected(_)));
        assert!(model.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_state_machine() {
        let model = ScriptedModel::with(vec![
            Ok(text_reply(r#"{"is_relevant": true, "summary": "Keen on rural care."}"#)),
            Err(CarmsError::HttpError("timeout".to_string())),
            Ok(text_reply(r#"{"is_relevant": true, "summary": "Again."}"#)),
            Ok(text_reply(r#"{"is_relevant": false, "summary": "A receipt."}"#)),
        ]);
        let agent = agent(model);
        let pdf = b"%PDF-1.4 test";

        let first = agent
            .upload_document("s1", "cv.pdf", Some("application/pdf"), pdf)
            .await
            .unwrap();
        assert!(first.has_content());
        assert!(agent.profile("s1").await.is_some());

        let failed = agent
            .upload_document("s1", "cv.pdf", Some("application/pdf"), pdf)
            .await;
        assert!(matches!(failed, Err(CarmsError::ExtractionFailed(_))));
        assert!(agent.profile("s1").await.is_none());

        agent
            .upload_document("s1", "cv.pdf", Some("application/pdf"), pdf)
            .await
            .unwrap();
        let irrelevant = agent
            .upload_document("s1", "receipt.pdf", Some("application/pdf"), pdf)
            .await
            .unwrap();
        assert!(!irrelevant.has_content());
        assert_eq!(agent.compose_message("s1", "hi").await, "hi");
    }

    #[tokio::test]
    async fn test_delete_session_clears_mapping_and_profile() {
        let agent = agent(ScriptedModel::with(vec![Ok(text_reply("hi"))]));
        agent.profiles.put("s1", profile(true)).await;
        run(&agent, "s1", "hello").await;
        assert!(agent.sessions.get("s1").await.is_some());

        agent.delete_session("s1").await;
        assert!(agent.sessions.get("s1").await.is_none());
        assert!(agent.profile("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_disconnected_client_discards_resume_token() {
        let agent = agent(ScriptedModel::with(vec![Ok(text_reply("hi"))]));
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        agent.chat("s1", "hello", tx).await;
        assert!(agent.sessions.get("s1").await.is_none());
    }

    #[test]
    fn test_event_wire_shape() {
        let event = AgentEvent::ToolUse {
            tool: "search_programs".to_string(),
            input: json!({"query": "rural"}),
        };
        assert_eq!(event.name(), "tool_use");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"tool": "search_programs", "input": {"query": "rural"}})
        );
        assert!(AgentEvent::Error { error: String::new() }.is_terminal());
    }

    #[test]
    fn test_validate_message() {
        assert!(validate_message("hello").is_ok());
        assert!(validate_message("").is_err());
        assert!(validate_message(&"a".repeat(MAX_MESSAGE_CHARS + 1)).is_err());
    }
}
