use std::env;
use std::fmt;

use reqwest::StatusCode;
use serde::Serialize;

use crate::llm::{groq, watsonx};

/// Hosted chat-completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Groq,
    Watsonx,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::Watsonx => "watsonx",
        }
    }

    /// Parses a provider name as accepted by flags, env vars, and profiles.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "groq" => Some(Self::Groq),
            "watsonx" => Some(Self::Watsonx),
            _ => None,
        }
    }
}

pub fn api_key_env(provider: Provider) -> &'static str {
    match provider {
        Provider::Groq => "GROQ_API_KEY",
        Provider::Watsonx => "IBM_API_KEY",
    }
}

pub fn is_api_key_present(provider: Provider) -> bool {
    env::var(api_key_env(provider))
        .ok()
        .is_some_and(|value| !value.trim().is_empty())
}

pub(crate) fn require_env(provider: Provider, key_env: &'static str) -> Result<String, ProviderError> {
    env::var(key_env)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ProviderError::MissingEnv { provider, key_env })
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

#[derive(Debug, Clone, Copy)]
pub struct AskOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: None,
            timeout_secs: None,
            retries: 0,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct AskResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug)]
pub enum ProviderError {
    MissingEnv {
        provider: Provider,
        key_env: &'static str,
    },
    Request {
        provider: Provider,
        source: reqwest::Error,
    },
    Api {
        provider: Provider,
        status: StatusCode,
        body: String,
    },
    EmptyResponse {
        provider: Provider,
    },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEnv { key_env, .. } => {
                write!(f, "{key_env} is not set in the environment")
            }
            Self::Request { provider, source } => {
                write!(f, "{} request failed: {source}", provider.as_str())
            }
            Self::Api {
                provider,
                status,
                body,
            } => write!(f, "{} API error {status}: {body}", provider.as_str()),
            Self::EmptyResponse { provider } => {
                write!(
                    f,
                    "{} response did not contain the expected content",
                    provider.as_str()
                )
            }
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub async fn ask(
    provider: Provider,
    model: &str,
    messages: &[ChatMessage],
    options: AskOptions,
) -> Result<AskResponse, ProviderError> {
    match provider {
        Provider::Groq => groq::ask_messages(messages, model, options).await,
        Provider::Watsonx => watsonx::ask_messages(messages, model, options).await,
    }
}
