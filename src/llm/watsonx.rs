use serde::{Deserialize, Serialize};

use crate::llm::provider::{
    require_env, AskOptions, AskResponse, ChatMessage, Provider, ProviderError, Usage,
};
use crate::llm::retry::{post_json_with_retry, PostFailure, RetryPolicy};

const IAM_TOKEN_URL: &str = "https://iam.cloud.ibm.com/identity/token";
const IAM_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";
const WATSONX_API_VERSION: &str = "2024-10-08";

/// Deployment coordinates resolved from `IBM_URL`, `IBM_API_KEY`, and
/// `IBM_PROJECT_ID`.
#[derive(Debug, Clone)]
pub(crate) struct WatsonxContext {
    pub url: String,
    pub api_key: String,
    pub project_id: String,
}

impl WatsonxContext {
    pub fn resolve() -> Result<Self, ProviderError> {
        let provider = Provider::Watsonx;
        Ok(Self {
            url: require_env(provider, "IBM_URL")?,
            api_key: require_env(provider, "IBM_API_KEY")?,
            project_id: require_env(provider, "IBM_PROJECT_ID")?,
        })
    }

    pub fn chat_url(&self) -> String {
        format!(
            "{}/ml/v1/text/chat?version={WATSONX_API_VERSION}",
            self.url.trim_end_matches('/')
        )
    }

    pub fn embeddings_url(&self) -> String {
        format!(
            "{}/ml/v1/text/embeddings?version={WATSONX_API_VERSION}",
            self.url.trim_end_matches('/')
        )
    }

    /// Exchanges the account API key for an IAM access token.
    pub async fn iam_token(&self, client: &reqwest::Client) -> Result<String, ProviderError> {
        let provider = Provider::Watsonx;
        let response = client
            .post(IAM_TOKEN_URL)
            .form(&[("grant_type", IAM_GRANT_TYPE), ("apikey", &self.api_key)])
            .send()
            .await
            .map_err(|source| ProviderError::Request { provider, source })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider,
                status,
                body,
            });
        }

        let token: IamTokenResponse = response
            .json()
            .await
            .map_err(|source| ProviderError::Request { provider, source })?;
        Ok(token.access_token)
    }
}

#[derive(Debug, Deserialize)]
struct IamTokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct TextChatRequest {
    model_id: String,
    project_id: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TextChatResponse {
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
    let provider = Provider::Watsonx;
    let context = WatsonxContext::resolve()?;

    let payload = TextChatRequest {
        model_id: model.to_string(),
        project_id: context.project_id.clone(),
        messages: messages.to_vec(),
        temperature: options.temperature,
        max_tokens: options.max_tokens,
    };

    let client = reqwest::Client::new();
    let token = context.iam_token(&client).await?;
    let response = post_json_with_retry(
        &client,
        &context.chat_url(),
        &token,
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

    let body: TextChatResponse = response
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
