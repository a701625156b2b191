//! Completion-service call

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::config::ProxyConfig;
use super::error::ProxyError;
use super::prompt::{CHOREOGRAPHER_PROMPT, FALLBACK_INSTRUCTION, USER_MESSAGE};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// One-shot client for the choreographer prompt. No retries, no streaming.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    config: ProxyConfig,
}

impl CompletionClient {
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Ask for one instruction
    pub async fn instruction(&self) -> Result<String, ProxyError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(ProxyError::MissingCredential);
        };

        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: CHOREOGRAPHER_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: USER_MESSAGE,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .http
            .post(&self.config.completion_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .inspect_err(|e| log::error!("Completion request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            log::warn!("Completion service returned {}: {}", status, detail);
            let status =
                StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            return Err(ProxyError::Upstream(status));
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProxyError::Decode(e.to_string()))?;
        Ok(first_content(data).unwrap_or_else(|| FALLBACK_INSTRUCTION.to_string()))
    }
}

/// First non-empty message content
fn first_content(data: ChatResponse) -> Option<String> {
    data.choices
        .into_iter()
        .next()?
        .message?
        .content
        .filter(|c| !c.is_empty())
}
