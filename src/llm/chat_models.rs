use serde_json::{json, Map, Value};

use crate::llm::ai::AIMessage;
use crate::llm::groq::GROQ_CHAT_COMPLETIONS_URL;
use crate::llm::human::HumanMessage;
use crate::llm::provider::{api_key_env, require_env, AskOptions, Provider, ProviderError};
use crate::llm::retry::{post_json_with_retry, PostFailure, RetryPolicy};
use crate::llm::tools::{ToolCall, ToolDefinition};
use crate::llm::watsonx::WatsonxContext;

/// Supported role values in chat requests.
#[derive(Debug, Clone)]
pub enum MessageRole {
    /// System instruction role.
    System,
    /// Human/user role.
    User,
    /// Assistant role.
    Assistant,
    /// Tool result role.
    Tool,
}

impl MessageRole {
    fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// Chat message wrapper used by the tool-calling clients.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    role: MessageRole,
    content: Value,
    tool_call_id: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    /// Builds a system instruction message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Value::String(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Builds a user message from a [`HumanMessage`].
    pub fn user(message: HumanMessage) -> Self {
        Self {
            role: MessageRole::User,
            content: message.to_json(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Builds an assistant message from an [`AIMessage`].
    pub fn assistant_from_ai(message: &AIMessage) -> Self {
        let content = if message.content.is_empty() {
            Value::Null
        } else {
            Value::String(message.content.clone())
        };
        Self {
            role: MessageRole::Assistant,
            content,
            tool_call_id: None,
            tool_calls: if message.tool_calls.is_empty() {
                None
            } else {
                Some(message.tool_calls.clone())
            },
        }
    }

    /// Builds a tool-result message associated with a tool call id.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Value::String(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }

    /// Serializes this chat message to provider JSON format.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "role".to_string(),
            Value::String(self.role.as_str().to_string()),
        );
        map.insert("content".to_string(), self.content.clone());
        if let Some(tool_call_id) = &self.tool_call_id {
            map.insert(
                "tool_call_id".to_string(),
                Value::String(tool_call_id.clone()),
            );
        }
        if let Some(tool_calls) = &self.tool_calls {
            map.insert(
                "tool_calls".to_string(),
                Value::Array(tool_calls.iter().map(|call| call.to_json()).collect()),
            );
        }
        Value::Object(map)
    }
}

/// Groq chat-completions client with optional bound tools.
#[derive(Debug, Clone)]
pub struct ChatGroq {
    model: String,
    options: AskOptions,
    api_key: String,
    client: reqwest::Client,
    tools: Option<Vec<ToolDefinition>>,
}

impl ChatGroq {
    /// Creates a client from a model id and the `GROQ_API_KEY` env var.
    pub fn new(model: impl Into<String>, options: AskOptions) -> Result<Self, ProviderError> {
        let provider = Provider::Groq;
        let api_key = require_env(provider, api_key_env(provider))?;
        Ok(Self {
            model: model.into(),
            options,
            api_key,
            client: reqwest::Client::new(),
            tools: None,
        })
    }

    /// Returns a cloned client bound to tool definitions.
    pub fn bind_tools(&self, tools: Vec<ToolDefinition>) -> Self {
        let mut bound = self.clone();
        bound.tools = Some(tools);
        bound
    }

    /// Invokes the model with fully-typed role messages.
    pub async fn invoke_messages(
        &self,
        messages: &[ChatMessage],
    ) -> Result<AIMessage, ProviderError> {
        let mut payload = Map::new();
        payload.insert("model".to_string(), Value::String(self.model.clone()));
        payload.insert(
            "messages".to_string(),
            Value::Array(messages.iter().map(|message| message.to_json()).collect()),
        );
        if let Some(temperature) = self.options.temperature {
            payload.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = self.options.max_tokens {
            payload.insert("max_tokens".to_string(), json!(max_tokens));
        }
        if let Some(tools) = &self.tools {
            payload.insert(
                "tools".to_string(),
                Value::Array(tools.iter().map(|tool| tool.to_json()).collect()),
            );
            payload.insert("tool_choice".to_string(), Value::String("auto".to_string()));
        }

        let body = send_chat_payload(
            Provider::Groq,
            &self.client,
            GROQ_CHAT_COMPLETIONS_URL,
            &self.api_key,
            &Value::Object(payload),
            self.options,
        )
        .await?;
        Ok(parse_ai_message(&body))
    }
}

/// IBM watsonx.ai text-chat client with optional bound tools.
#[derive(Debug, Clone)]
pub struct ChatWatsonx {
    model: String,
    options: AskOptions,
    context: WatsonxContext,
    client: reqwest::Client,
    tools: Option<Vec<ToolDefinition>>,
}

impl ChatWatsonx {
    /// Creates a client from a model id and the `IBM_*` env vars.
    pub fn new(model: impl Into<String>, options: AskOptions) -> Result<Self, ProviderError> {
        Ok(Self {
            model: model.into(),
            options,
            context: WatsonxContext::resolve()?,
            client: reqwest::Client::new(),
            tools: None,
        })
    }

    /// Returns a cloned client bound to tool definitions.
    pub fn bind_tools(&self, tools: Vec<ToolDefinition>) -> Self {
        let mut bound = self.clone();
        bound.tools = Some(tools);
        bound
    }

    /// Invokes the model with fully-typed role messages.
    pub async fn invoke_messages(
        &self,
        messages: &[ChatMessage],
    ) -> Result<AIMessage, ProviderError> {
        let mut payload = Map::new();
        payload.insert("model_id".to_string(), Value::String(self.model.clone()));
        payload.insert(
            "project_id".to_string(),
            Value::String(self.context.project_id.clone()),
        );
        payload.insert(
            "messages".to_string(),
            Value::Array(messages.iter().map(|message| message.to_json()).collect()),
        );
        if let Some(temperature) = self.options.temperature {
            payload.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = self.options.max_tokens {
            payload.insert("max_tokens".to_string(), json!(max_tokens));
        }
        if let Some(tools) = &self.tools {
            payload.insert(
                "tools".to_string(),
                Value::Array(tools.iter().map(|tool| tool.to_json()).collect()),
            );
            payload.insert(
                "tool_choice_option".to_string(),
                Value::String("auto".to_string()),
            );
        }

        let token = self.context.iam_token(&self.client).await?;
        let body = send_chat_payload(
            Provider::Watsonx,
            &self.client,
            &self.context.chat_url(),
            &token,
            &Value::Object(payload),
            self.options,
        )
        .await?;
        Ok(parse_ai_message(&body))
    }
}

/// Provider-dispatching wrapper over the tool-calling clients.
#[derive(Debug, Clone)]
pub enum ChatClient {
    Groq(ChatGroq),
    Watsonx(ChatWatsonx),
}

impl ChatClient {
    /// Creates a client for the given provider.
    pub fn new(
        provider: Provider,
        model: impl Into<String>,
        options: AskOptions,
    ) -> Result<Self, ProviderError> {
        match provider {
            Provider::Groq => Ok(Self::Groq(ChatGroq::new(model, options)?)),
            Provider::Watsonx => Ok(Self::Watsonx(ChatWatsonx::new(model, options)?)),
        }
    }

    /// Returns a cloned client bound to tool definitions.
    pub fn bind_tools(&self, tools: Vec<ToolDefinition>) -> Self {
        match self {
            Self::Groq(client) => Self::Groq(client.bind_tools(tools)),
            Self::Watsonx(client) => Self::Watsonx(client.bind_tools(tools)),
        }
    }

    /// Invokes the model with fully-typed role messages.
    pub async fn invoke_messages(
        &self,
        messages: &[ChatMessage],
    ) -> Result<AIMessage, ProviderError> {
        match self {
            Self::Groq(client) => client.invoke_messages(messages).await,
            Self::Watsonx(client) => client.invoke_messages(messages).await,
        }
    }
}

async fn send_chat_payload(
    provider: Provider,
    client: &reqwest::Client,
    url: &str,
    bearer_token: &str,
    payload: &Value,
    options: AskOptions,
) -> Result<Value, ProviderError> {
    let response = post_json_with_retry(
        client,
        url,
        bearer_token,
        payload,
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

    response
        .json()
        .await
        .map_err(|source| ProviderError::Request { provider, source })
}

fn parse_ai_message(body: &Value) -> AIMessage {
    let message = &body["choices"][0]["message"];
    // content is null when the model answers with tool calls only
    let content = message["content"].as_str().unwrap_or("").to_string();
    AIMessage {
        content,
        tool_calls: parse_tool_calls(message),
    }
}

/// Parses tool call requests out of an assistant message payload.
///
/// `arguments` may arrive as a JSON-encoded string or an inline object;
/// entries without a function name are skipped.
pub fn parse_tool_calls(message: &Value) -> Vec<ToolCall> {
    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let id = call["id"].as_str().unwrap_or("").to_string();
            let name = call["function"]["name"].as_str().unwrap_or("").to_string();
            let arguments = &call["function"]["arguments"];
            let args = match arguments {
                Value::String(raw) => {
                    serde_json::from_str(raw).unwrap_or(Value::String(raw.clone()))
                }
                other => other.clone(),
            };
            if !name.is_empty() {
                tool_calls.push(ToolCall { id, name, args });
            }
        }
    }
    tool_calls
}
