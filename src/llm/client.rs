//! Anthropic Messages API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::ChatRequest;
use super::ChatResponse;
use super::LanguageModel;
use super::Message;
use super::ToolDefinition;
use crate::errors::CarmsError;
use crate::errors::Result;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
    client: Client,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

impl AnthropicClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| CarmsError::HttpError(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            temperature,
            client,
        })
    }

    /// Chat client using the configured chat model
    pub fn from_config(config: &crate::config::AppConfig) -> Result<Self> {
        let api_key = config
            .llm_key()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CarmsError::FeatureDisabled("LLM API key not configured".to_string()))?;

        Self::new(
            config.llm_endpoint(),
            api_key,
            config.llm_model(),
            config.llm.max_tokens,
            config.llm.temperature,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.api_key.trim())
                .map_err(|_| CarmsError::ConfigError("invalid Anthropic API key".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let body = MessagesRequest {
            model,
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: request.temperature.unwrap_or(self.temperature),
            system: request.system.as_deref(),
            messages: &request.messages,
            tools: &request.tools,
        };

        let url = format!("{}/v1/messages", self.endpoint);
        debug!(
            "Calling Anthropic messages API: model={}, messages={}, tools={}",
            model,
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| CarmsError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(CarmsError::LlmError(format!(
                "Anthropic returned {status}: {error_text}"
            )));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| CarmsError::LlmError(format!("Failed to parse Anthropic response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ContentBlock;

    #[test]
    fn test_request_body_shape() {
        let messages = vec![Message::user("hi")];
        let body = MessagesRequest {
            model: "claude-haiku-4-5-20251001",
            max_tokens: 256,
            temperature: 0.0,
            system: None,
            messages: &messages,
            tools: &[],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("system").is_none());
        assert!(value.get("tools").is_none());
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"][0]["type"], "text");
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = crate::config::AppConfig::default();
        assert!(matches!(
            AnthropicClient::from_config(&config),
            Err(CarmsError::FeatureDisabled(_))
        ));
    }

    #[tokio::test]
    #[ignore = "Requires API key"]
    async fn test_anthropic_roundtrip() {
        let client = AnthropicClient::new(
            "https://api.anthropic.com",
            std::env::var("ANTHROPIC_API_KEY").unwrap(),
            "claude-haiku-4-5-20251001",
            64,
            0.0,
        )
        .unwrap();
        let response = client
            .chat(ChatRequest {
                messages: vec![Message {
                    role: crate::llm::Role::User,
                    content: vec![ContentBlock::text("Reply with the word ok")],
                }],
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!response.text().is_empty());
    }
}
