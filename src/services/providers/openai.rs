//! OpenAI chat-completions provider
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint. Images are
//! inlined as base64 data URLs in `image_url` content parts.

use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::{json, Value};

use crate::{
    config::Config,
    error::{AppError, AppResult},
    services::providers::{ChatMessage, ChatRequest, ContentPart, VisionModel},
};

const SERVICE_NAME: &str = "OpenAI";
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Clone)]
pub struct OpenAiProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(config: &Config) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(config.ai_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key: config.openai_api_key.clone(),
            api_url: config.openai_api_url.trim_end_matches('/').to_string(),
            model: config.openai_model.clone(),
        })
    }

    fn build_payload(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_json).collect();

        let mut payload = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
        });

        if let Some(temperature) = request.temperature {
            payload["temperature"] = json!(temperature);
        }
        if request.json_response {
            payload["response_format"] = json!({ "type": "json_object" });
        }

        payload
    }
}

fn message_to_json(message: &ChatMessage) -> Value {
    // Plain-text messages keep the compact string form
    if let [ContentPart::Text(text)] = message.content.as_slice() {
        return json!({ "role": message.role.as_str(), "content": text });
    }

    let parts: Vec<Value> = message
        .content
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => json!({ "type": "text", "text": text }),
            ContentPart::Image { mime_type, data } => {
                let encoded = general_purpose::STANDARD.encode(data);
                json!({
                    "type": "image_url",
                    "image_url": { "url": format!("data:{};base64,{}", mime_type, encoded) }
                })
            }
        })
        .collect();

    json!({ "role": message.role.as_str(), "content": parts })
}

/// Pulls the provider's own error message out of an error body, if it has one
fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
            return message.to_string();
        }
    }

    trimmed.chars().take(ERROR_BODY_LIMIT).collect()
}

/// Maps a failed completion to an error kind
///
/// Quota and service failures are surfaced verbatim and never retried, so
/// throttling and 5xx become `AiService` rather than `Network`.
fn status_error(status: StatusCode, body: &str) -> AppError {
    match AppError::from_status(SERVICE_NAME, status, summarize_error_body(body)) {
        AppError::Network(message) => AppError::AiService(message),
        other => other,
    }
}

fn extract_content(body: &Value) -> AppResult<String> {
    let content = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();

    if content.is_empty() {
        let reason = body
            .pointer("/choices/0/finish_reason")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return Err(AppError::AiService(format!(
            "{} returned an empty completion (finish reason: {})",
            SERVICE_NAME, reason
        )));
    }

    Ok(content.to_string())
}

#[async_trait::async_trait]
impl VisionModel for OpenAiProvider {
    async fn complete(&self, request: ChatRequest) -> AppResult<String> {
        let payload = self.build_payload(&request);
        let url = format!("{}/chat/completions", self.api_url);

        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            images = request.messages.iter().map(ChatMessage::image_count).sum::<usize>(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = status_error(status, &body);
            tracing::warn!(status = %status, error = %err, "OpenAI API error");
            return Err(err);
        }

        let body: Value = response.json().await?;
        let content = extract_content(&body)?;

        tracing::info!(
            model = %self.model,
            chars = content.len(),
            "Chat completion received"
        );

        Ok(content)
    }

    fn name(&self) -> String {
        self.model.clone()
    }
}
