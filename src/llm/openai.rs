//! OpenAI-compatible chat completions client.
//!
//! Only the fields the tutor reads are modelled; everything else in the
//! provider's response is ignored.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::LlmTimeouts;
use super::types::{ChatMessage, ChatParams, ChatResponse, LlmError, Role};

const COMPLETIONS_PATH: &str = "/chat/completions";

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: String, base_url: String, timeouts: LlmTimeouts) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| LlmError::ClientBuild(e.to_string()))?;
        Ok(Self { http, api_key, base_url })
    }

    /// # Errors
    ///
    /// Transport failure, any non-2xx status, or a body without an answer.
    pub async fn chat(
        &self,
        model: &str,
        params: ChatParams,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatResponse, LlmError> {
        let turns = with_system_prompt(system, messages);
        let request = CompletionRequest {
            model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            messages: &turns,
        };

        let response = self
            .http
            .post(format!("{}{COMPLETIONS_PATH}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(LlmError::Upstream { status: status.as_u16(), body });
        }
        parse_completion(&body)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionBody {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Default, Deserialize)]
struct TokenUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// System prompt first (when non-blank), then the non-empty turns.
pub(crate) fn with_system_prompt(system: &str, messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let system = (!system.trim().is_empty()).then(|| ChatMessage { role: Role::System, content: system.to_owned() });
    system
        .into_iter()
        .chain(messages.iter().filter(|m| !m.content.is_empty()).cloned())
        .collect()
}

pub(crate) fn parse_completion(body: &str) -> Result<ChatResponse, LlmError> {
    let parsed: CompletionBody = serde_json::from_str(body).map_err(|e| LlmError::Malformed(e.to_string()))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Malformed("no choices".into()))?;
    let text = choice
        .message
        .content
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| LlmError::Malformed("empty answer".into()))?
        .to_owned();

    Ok(ChatResponse {
        text,
        model: parsed.model,
        finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".into()),
        input_tokens: parsed.usage.prompt_tokens,
        output_tokens: parsed.usage.completion_tokens,
    })
}

#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;
