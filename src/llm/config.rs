//! LLM configuration parsed from environment variables.

use super::types::LlmError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4-turbo";
pub const DEFAULT_LLM_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LLM_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeouts: LlmTimeouts,
}

impl LlmConfig {
    /// Build typed LLM config from environment variables.
    ///
    /// Required:
    /// - `LLM_API_KEY_ENV` (names the env var containing the key; defaults
    ///   to `OPENAI_API_KEY`)
    ///
    /// Optional:
    /// - `LLM_MODEL`: default `gpt-4-turbo`
    /// - `LLM_BASE_URL`: any OpenAI-compatible chat completions API
    /// - `LLM_REQUEST_TIMEOUT_SECS`: default 120
    /// - `LLM_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if the API key variable is unset or empty.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// # Errors
    ///
    /// Returns an error if the API key variable is unset or empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LlmError> {
        let key_var = lookup("LLM_API_KEY_ENV").unwrap_or_else(|| "OPENAI_API_KEY".to_owned());
        let api_key = lookup(&key_var)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey { var: key_var.clone() })?;

        let model = lookup("LLM_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_owned());
        let base_url = lookup("LLM_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let timeouts = LlmTimeouts {
            request_secs: parse_u64(&lookup, "LLM_REQUEST_TIMEOUT_SECS", DEFAULT_LLM_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_u64(&lookup, "LLM_CONNECT_TIMEOUT_SECS", DEFAULT_LLM_CONNECT_TIMEOUT_SECS)?,
        };

        Ok(Self { api_key, model, base_url, timeouts })
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64, LlmError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| LlmError::InvalidConfig(format!("{key} must be a whole number of seconds, got {raw:?}"))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
