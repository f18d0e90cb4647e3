use serde::{Deserialize, Serialize};

use crate::llm::provider::{
    api_key_env, require_env, AskOptions, AskResponse, ChatMessage, Provider, ProviderError, Usage,
};
use crate::llm::retry::{post_json_with_retry, PostFailure, RetryPolicy};

pub(crate) const GROQ_CHAT_COMPLETIONS_URL: &str =
    "https://api.groq.com/openai/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

pub async fn ask_messages(
    messages: &[ChatMessage],
    model: &str,
    options: AskOptions,
) -> Result<AskResponse, ProviderError> {
    let provider = Provider::Groq;
    let api_key = require_env(provider, api_key_env(provider))?;

    let payload = ChatCompletionRequest {
        model: model.to_string(),
        messages: messages.to_vec(),
        temperature: options.temperature,
        max_tokens: options.max_tokens,
    };

    let client = reqwest::Client::new();
    let response = post_json_with_retry(
        &client,
        GROQ_CHAT_COMPLETIONS_URL,
        &api_key,
        &payload,
        RetryPolicy {
            timeout_secs: options.timeout_secs,
            retries: options.retries,
            retry_delay_ms: options.retry_delay_ms,
        },
    )
    .await
    .map_err(|failure| match failure {
        PostFailure::Transport(source) => ProviderError::Request { provider, source },
        PostFailure::Status { status, body } => ProviderError::Api {
            provider,
            status,
            body,
        },
    })?;

    let body: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|source| ProviderError::Request { provider, source })?;
    let content = body
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .filter(|content| !content.is_empty())
        .ok_or(ProviderError::EmptyResponse { provider })?;
    let usage = body.usage.map(|usage| Usage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    });

    Ok(AskResponse { content, usage })
}
