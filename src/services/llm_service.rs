// src/services/llm_service.rs
use crate::config::AppConfig;
use crate::errors::LeafError;
use crate::models::ChatPrompt;
use async_trait::async_trait;
use log::warn;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
// Provider bodies are logged, not returned; keep log lines bounded.
const MAX_LOGGED_BODY: usize = 2048;

#[async_trait]
pub trait ExplanationService: Send + Sync {
    async fn explain(&self, prompt: &ChatPrompt) -> Result<String, LeafError>;
}

pub struct MistralService {
    api_key: String,
    api_url: String,
    model: String,
    client: Client,
}

impl MistralService {
    pub fn new(config: &AppConfig) -> Result<Self, LeafError> {
        let client = Client::builder()
            .timeout(config.explanation_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LeafError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            model: config.llm_model.clone(),
            client,
        })
    }
}

#[async_trait]
impl ExplanationService for MistralService {
    async fn explain(&self, prompt: &ChatPrompt) -> Result<String, LeafError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": prompt.messages,
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LeafError::Explanation("Mistral request timed out".to_string())
                } else {
                    LeafError::Explanation(format!("Mistral request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LeafError::Explanation(format!("Failed to read Mistral response: {}", e)))?;

        parse_completion(status, &body).inspect_err(|e| {
            warn!("{}; provider body: {}", e, truncate(&body, MAX_LOGGED_BODY));
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Extracts `choices[0].message.content` from a chat-completions reply.
/// Any other shape is an error; the body is never passed through as text.
pub fn parse_completion(status: StatusCode, body: &str) -> Result<String, LeafError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(LeafError::Explanation(format!(
            "Mistral rejected the API key (status {})",
            status.as_u16()
        )));
    }
    if !status.is_success() {
        return Err(LeafError::Explanation(format!(
            "Mistral returned status {}",
            status.as_u16()
        )));
    }

    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| LeafError::Explanation(format!("Malformed Mistral response: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| {
            LeafError::Explanation("Mistral response has no choices[0].message.content".to_string())
        })
}

fn truncate(body: &str, max: usize) -> &str {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
