/// LLM Client — the single point of entry for all chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may talk to the LLM endpoint directly.
/// All LLM interactions MUST go through this module.
///
/// Speaks the OpenAI-compatible shape served by LM Studio and similar local
/// hosts: POST /chat/completions with model, messages, temperature, top_p,
/// seed, max_tokens, stop. The endpoint is injectable via `ChatEndpoint` so
/// tests can script responses without a server.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod repair;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:1234/v1";
pub const DEFAULT_MODEL: &str = "qwen2.5-32b-instruct";

/// Local models can take a long time on big prompts; the run budget is the
/// single long timeout, with no automatic retry on top of it.
pub const DEFAULT_TIMEOUT_SECS: u64 = 1800;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("no response within {0} seconds")]
    Timeout(u64),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM returned empty content")]
    EmptyContent,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Decoding configuration for one call.
#[derive(Debug, Clone)]
pub struct GenOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub seed: u64,
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl GenOptions {
    /// Deterministic profile used by the skill extractor.
    /// Fixed seed and zero temperature keep re-runs reproducible.
    pub fn deterministic() -> Self {
        Self {
            temperature: 0.0,
            top_p: 0.9,
            seed: 42,
            max_tokens: 4096,
            stop: Vec::new(),
        }
    }

    /// Higher-temperature profile used by the summary tailorer.
    pub fn creative() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            seed: 42,
            max_tokens: 2000,
            stop: Vec::new(),
        }
    }
}

/// Anything that can answer a chat request. Implemented by `OpenAiClient`
/// for real endpoints and by scripted doubles in tests.
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], options: &GenOptions)
        -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
    seed: u64,
    max_tokens: u32,
    stop: &'a [String],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(base_url: String, api_key: String, model: String, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
            api_key,
            model,
            timeout_secs,
        }
    }
}

#[async_trait]
impl ChatEndpoint for OpenAiClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &GenOptions,
    ) -> Result<String, LlmError> {
        let request_body = ChatRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            top_p: options.top_p,
            seed: options.seed,
            max_tokens: options.max_tokens,
            stop: &options.stop,
            // Streaming is off: the full response is awaited before parsing.
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.timeout_secs)
            } else {
                LlmError::Unreachable(e.to_string())
            }
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyContent)?;

        debug!("LLM call succeeded: {} response chars", content.len());
        Ok(content)
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted endpoint double for exercising the LLM-facing paths.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// One scripted turn of the fake endpoint.
    pub enum Script {
        Reply(String),
        Timeout,
        Unreachable,
        Empty,
    }

    pub struct ScriptedEndpoint {
        script: Mutex<VecDeque<Script>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedEndpoint {
        pub fn new(turns: Vec<Script>) -> Self {
            Self {
                script: Mutex::new(turns.into()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatEndpoint for ScriptedEndpoint {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: &GenOptions,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let turn = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted endpoint exhausted");
            match turn {
                Script::Reply(text) => Ok(text),
                Script::Timeout => Err(LlmError::Timeout(1800)),
                Script::Unreachable => Err(LlmError::Unreachable("connection refused".into())),
                Script::Empty => Err(LlmError::EmptyContent),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_profile() {
        let opts = GenOptions::deterministic();
        assert_eq!(opts.temperature, 0.0);
        assert_eq!(opts.seed, 42);
        assert_eq!(opts.max_tokens, 4096);
    }

    #[test]
    fn test_creative_profile() {
        let opts = GenOptions::creative();
        assert!((opts.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(opts.max_tokens, 2000);
    }

    #[test]
    fn test_chat_message_roles() {
        assert_eq!(ChatMessage::system("s").role, "system");
        assert_eq!(ChatMessage::user("u").role, "user");
    }

    #[test]
    fn test_response_shape_deserializes() {
        let json = r#"{"choices": [{"message": {"content": "hello"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
    }
}
