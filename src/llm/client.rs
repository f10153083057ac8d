//! OpenAI-compatible chat completions client
//!
//! Works against any `/chat/completions` endpoint (OpenAI, NVIDIA, Ollama,
//! LM Studio, ...). The API key is read from the provider's `env_key` on
//! every request so rotated keys are picked up without a restart.

use super::LanguageModel;
use crate::config::ModelProviderConfig;
use crate::types::ConversationTurn;
use crate::{RagCrewError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_RETRY_ATTEMPTS: u32 = 4;
const RETRY_BASE_DELAY_MS: u64 = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_TOKENS: u32 = 2048;

const SYSTEM_PROMPT: &str = "You are a helpful assistant. \
If CONTEXT is provided, rely strongly on it. \
If CONTEXT is empty, answer using your own knowledge.";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Model output with `<think>` reasoning separated from the answer
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub thinking: Option<String>,
    pub response: String,
}

/// Chat completions client for one provider and model
pub struct ChatClient {
    client: Client,
    provider_id: String,
    model: String,
    temperature: f32,
    base_url: String,
    env_key: Option<String>,
    provider_headers: Vec<(String, String)>,
}

impl ChatClient {
    pub fn new(
        provider_id: &str,
        provider: &ModelProviderConfig,
        model: &str,
        temperature: f32,
    ) -> Result<Self> {
        let base_url = provider.base_url.clone().ok_or_else(|| {
            RagCrewError::Config(format!("model provider '{provider_id}' has no base_url"))
        })?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(15))
            .user_agent(concat!("ragcrew/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RagCrewError::Llm(format!("failed to build HTTP client: {e}")))?;

        let provider_headers = provider.resolve_headers();

        info!(
            "Chat client: provider={}, model={}, base_url={}, headers={}",
            provider_id,
            model,
            base_url,
            provider_headers.len()
        );

        Ok(Self {
            client,
            provider_id: provider_id.to_string(),
            model: model.to_string(),
            temperature,
            base_url: base_url.trim_end_matches('/').to_string(),
            env_key: provider.env_key.clone(),
            provider_headers,
        })
    }

    /// Split `<think>...</think>` reasoning from the final answer
    pub fn parse_think_tags(content: &str) -> ParsedResponse {
        static THINK_RE: OnceLock<Regex> = OnceLock::new();
        let re = THINK_RE
            .get_or_init(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("valid think regex"));

        if let Some(caps) = re.captures(content) {
            let thinking = caps.get(1).map(|m| m.as_str().trim().to_string());
            let response = re.replace_all(content, "").trim().to_string();
            ParsedResponse { thinking, response }
        } else if content.starts_with("<think>") {
            let thinking = content.trim_start_matches("<think>").trim().to_string();
            ParsedResponse {
                thinking: Some(thinking),
                response: String::new(),
            }
        } else {
            ParsedResponse {
                thinking: None,
                response: content.trim().to_string(),
            }
        }
    }

    /// Build the message list: system prompt, history, then the question with its context
    fn build_messages(
        question: &str,
        context: &str,
        history: &[ConversationTurn],
    ) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::new("system", SYSTEM_PROMPT)];

        for turn in history {
            messages.push(ChatMessage::new("user", turn.user.as_str()));
            if turn.has_assistant() {
                messages.push(ChatMessage::new("assistant", turn.assistant.as_str()));
            }
        }

        let context = if context.is_empty() {
            "(no context)"
        } else {
            context
        };
        messages.push(ChatMessage::new(
            "user",
            format!("QUESTION:\n{question}\n\nCONTEXT:\n{context}"),
        ));

        messages
    }

    /// Resolve the API key. `Err` carries the env var name when it is unset.
    fn api_key(&self) -> std::result::Result<Option<String>, String> {
        match &self.env_key {
            None => Ok(None),
            Some(var) => match std::env::var(var) {
                Ok(key) if !key.trim().is_empty() => Ok(Some(key.trim().to_string())),
                _ => Err(var.clone()),
            },
        }
    }

    /// Exponential backoff with a small deterministic jitter
    fn retry_backoff(attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        let base_ms = RETRY_BASE_DELAY_MS.saturating_mul(exp);
        let jitter = 1.0 + ((attempt as f64 * 0.37).sin() * 0.1);
        Duration::from_millis((base_ms as f64 * jitter) as u64)
    }

    fn is_retryable_error(msg: &str) -> bool {
        msg.contains("timeout")
            || msg.contains("network")
            || msg.contains("retryable")
            || msg.contains("error sending request")
            || msg.contains("connection")
    }

    async fn send_chat_completions_request(
        &self,
        api_key: Option<&str>,
        messages: &[ChatMessage],
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            max_tokens: MAX_TOKENS,
            temperature: self.temperature,
            stream: false,
        };

        let mut req_builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");

        for (name, value) in &self.provider_headers {
            req_builder = req_builder.header(name.as_str(), value.as_str());
        }
        if let Some(key) = api_key {
            req_builder = req_builder.bearer_auth(key);
        }

        let response = req_builder
            .json(&request)
            .send()
            .await
            .map_err(Self::map_reqwest_error)?;

        let response = Self::check_response_status(response).await?;

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| RagCrewError::Llm(e.to_string()))?;

        Ok(chat_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }

    async fn check_response_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = Self::truncate_error_detail(&Self::extract_error_detail(&body), 500);
        let prefix = if status.is_server_error() {
            "retryable API error"
        } else {
            "API error"
        };
        if detail.is_empty() {
            Err(RagCrewError::Llm(format!("{prefix} {status}")))
        } else {
            Err(RagCrewError::Llm(format!("{prefix} {status}: {detail}")))
        }
    }

    fn extract_error_detail(body: &str) -> String {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return String::new();
        }

        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if let Some(msg) = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
            {
                return msg.to_string();
            }
            if let Some(msg) = value.get("message").and_then(|m| m.as_str()) {
                return msg.to_string();
            }
            if let Some(msg) = value.get("detail").and_then(|m| m.as_str()) {
                return msg.to_string();
            }
        }

        trimmed.to_string()
    }

    fn truncate_error_detail(detail: &str, max_chars: usize) -> String {
        if detail.chars().count() <= max_chars {
            return detail.to_string();
        }

        let mut truncated = detail.chars().take(max_chars).collect::<String>();
        truncated.push_str("... [truncated]");
        truncated
    }

    fn map_reqwest_error(e: reqwest::Error) -> RagCrewError {
        if e.is_timeout() {
            RagCrewError::Llm(format!("timeout: {e}"))
        } else if e.is_connect() {
            RagCrewError::Llm(format!("network: {e}"))
        } else {
            RagCrewError::Llm(e.to_string())
        }
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    async fn generate(
        &self,
        question: &str,
        context: &str,
        history: &[ConversationTurn],
    ) -> Result<String> {
        let api_key = match self.api_key() {
            Ok(key) => key,
            Err(var) => {
                warn!("{} is not set; answering in degraded mode", var);
                return Ok(format!(
                    "{var} is missing. Set it in the environment or config.toml."
                ));
            }
        };

        let messages = Self::build_messages(question, context, history);
        debug!(
            "Calling {} with {} messages, context length {}",
            self.provider_id,
            messages.len(),
            context.len()
        );

        let mut last_err = None;
        for attempt in 0..MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                let delay = Self::retry_backoff(attempt);
                warn!(
                    "LLM request failed (attempt {}/{}), retrying in {:?}...",
                    attempt, MAX_RETRY_ATTEMPTS, delay
                );
                tokio::time::sleep(delay).await;
            }

            match self
                .send_chat_completions_request(api_key.as_deref(), &messages)
                .await
            {
                Ok(content) => {
                    let parsed = Self::parse_think_tags(&content);
                    if let Some(thinking) = &parsed.thinking {
                        debug!("LLM thinking: {}", thinking);
                    }
                    return Ok(parsed.response);
                }
                Err(e) => {
                    let msg = e.to_string();
                    if Self::is_retryable_error(&msg) && attempt + 1 < MAX_RETRY_ATTEMPTS {
                        last_err = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| RagCrewError::Llm("all retry attempts exhausted".to_string())))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(env_key: Option<&str>) -> ModelProviderConfig {
        ModelProviderConfig {
            name: Some("Test".to_string()),
            base_url: Some("http://127.0.0.1:9/v1/".to_string()),
            env_key: env_key.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_base_url() {
        let result = ChatClient::new("custom", &ModelProviderConfig::default(), "m", 0.2);
        assert!(matches!(result, Err(RagCrewError::Config(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ChatClient::new("custom", &provider(None), "m", 0.2).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:9/v1");
    }

    #[tokio::test]
    async fn test_missing_key_is_degraded_answer() {
        let client = ChatClient::new(
            "custom",
            &provider(Some("RAGCREW_TEST_KEY_THAT_IS_NEVER_SET")),
            "m",
            0.2,
        )
        .unwrap();
        let answer = client.generate("q", "", &[]).await.unwrap();
        assert_eq!(
            answer,
            "RAGCREW_TEST_KEY_THAT_IS_NEVER_SET is missing. Set it in the environment or config.toml."
        );
    }

    #[test]
    fn test_build_messages_skips_empty_assistant() {
        let history = vec![
            ConversationTurn::new("first", "reply"),
            ConversationTurn::user_only("second"),
        ];
        let messages = ChatClient::build_messages("third", "", &history);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user", "user"]);
        assert_eq!(
            messages.last().unwrap().content,
            "QUESTION:\nthird\n\nCONTEXT:\n(no context)"
        );
    }

    #[test]
    fn test_parse_think_tags() {
        let parsed = ChatClient::parse_think_tags("<think>hmm</think>\nThe answer.");
        assert_eq!(parsed.thinking.as_deref(), Some("hmm"));
        assert_eq!(parsed.response, "The answer.");

        let parsed = ChatClient::parse_think_tags("  plain  ");
        assert!(parsed.thinking.is_none());
        assert_eq!(parsed.response, "plain");
    }

    #[test]
    fn test_extract_error_detail() {
        let body = r#"{"error": {"message": "invalid api key"}}"#;
        assert_eq!(ChatClient::extract_error_detail(body), "invalid api key");
        assert_eq!(ChatClient::extract_error_detail("  oops "), "oops");
        assert_eq!(ChatClient::extract_error_detail(""), "");
    }

    #[test]
    fn test_truncate_error_detail() {
        let long = "x".repeat(20);
        assert_eq!(
            ChatClient::truncate_error_detail(&long, 5),
            "xxxxx... [truncated]"
        );
        assert_eq!(ChatClient::truncate_error_detail("short", 5), "short");
    }

    #[test]
    fn test_retry_backoff_grows() {
        assert!(ChatClient::retry_backoff(2) > ChatClient::retry_backoff(1));
        assert!(ChatClient::retry_backoff(3) > ChatClient::retry_backoff(2));
    }

    #[test]
    fn test_retryable_messages() {
        assert!(ChatClient::is_retryable_error("timeout: deadline"));
        assert!(ChatClient::is_retryable_error("retryable API error 503"));
        assert!(!ChatClient::is_retryable_error("API error 401 Unauthorized"));
    }
}
