//! Proxy configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Environment variable holding the completion-service credential
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

pub const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 3000);
pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "ft:gpt-4.1-nano-2025-04-14:personal:choreographer-ai:CdTfBoL2";

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub bind: SocketAddr,
    pub completion_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Whole-request timeout for the upstream call
    pub timeout: Duration,
    /// `None` makes every request fail with a missing-credential error
    pub api_key: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(DEFAULT_BIND),
            completion_url: DEFAULT_COMPLETION_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 300,
            temperature: 0.9,
            timeout: Duration::from_secs(30),
            api_key: None,
        }
    }
}

impl ProxyConfig {
    /// Defaults plus the credential from the environment, if set and non-empty
    pub fn from_env() -> Self {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            log::warn!("{} is not set; requests will fail", API_KEY_VAR);
        }
        Self {
            api_key,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_completion_url(mut self, url: impl Into<String>) -> Self {
        self.completion_url = url.into();
        self
    }
}
