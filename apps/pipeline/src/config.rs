//! Environment-driven configuration.
//!
//! Every knob has a default suitable for a local OpenAI-compatible server
//! (LM Studio, llama.cpp, vLLM); a `.env` file in the working directory is
//! honored when present.

use crate::llm_client::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            base_url: env_or("TAILOR_BASE_URL", DEFAULT_BASE_URL),
            api_key: env_or("TAILOR_API_KEY", "lm-studio"),
            model: env_or("TAILOR_MODEL", DEFAULT_MODEL),
            timeout_secs: std::env::var("TAILOR_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            rust_log: env_or("RUST_LOG", "info"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
