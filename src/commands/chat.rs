use clap::Args;
use owo_colors::OwoColorize;
use serde_json::{json, Value};

use crate::commands::options::{self, OutputMode, RequestFlags};
use crate::llm::chat_models::{ChatClient, ChatMessage};
use crate::llm::human::HumanMessage;
use crate::llm::provider;
use crate::llm::tools::{
    number_arg, ToolDefinition, ToolError, ToolFunction, ToolParam, ToolRegistry,
};

#[derive(Debug, Args, Clone)]
pub struct ChatArgs {
    /// Provider name: groq or watsonx.
    #[arg(long)]
    provider: Option<String>,
    /// Model id understood by the provider.
    #[arg(long)]
    model: Option<String>,
    /// Profile name from the config file.
    #[arg(long)]
    profile: Option<String>,
    /// System prompt prepended to the conversation.
    #[arg(long)]
    system: Option<String>,
    #[arg(long)]
    temperature: Option<f64>,
    #[arg(long)]
    max_tokens: Option<u32>,
    /// Request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
    #[arg(long)]
    retries: Option<u32>,
    /// Base retry delay in milliseconds.
    #[arg(long)]
    retry_delay: Option<u64>,
    /// Pretty-print the registered tool descriptors.
    #[arg(long)]
    show_tools: bool,
    /// Print the full transcript as JSON instead of the final answer.
    #[arg(long)]
    json: bool,
    #[arg(long)]
    verbose: bool,
    /// Print the first request instead of sending it.
    #[arg(long)]
    dry_run: bool,
    /// Prompt text; read from stdin when absent.
    prompt: Option<String>,
}

pub async fn run(args: ChatArgs) -> Result<(), String> {
    let registry = calculator_tools().map_err(|err| err.to_string())?;
    let definitions = registry.definitions();

    if args.show_tools {
        let descriptors: Vec<Value> = definitions.iter().map(ToolDefinition::to_json).collect();
        let rendered = serde_json::to_string_pretty(&descriptors)
            .map_err(|err| format!("Failed to render tool descriptors: {err}"))?;
        println!("{rendered}");
    }

    let profile = options::load_profile_if_named(args.profile.as_deref())?;
    let provider = options::resolve_provider(args.provider.as_deref(), &profile)?;
    let model = options::resolve_model(args.model.clone(), &profile)?;
    let ask_options = options::resolve_ask_options(
        RequestFlags {
            temperature: args.temperature,
            max_tokens: args.max_tokens,
            timeout: args.timeout,
            retries: args.retries,
            retry_delay: args.retry_delay,
        },
        &profile,
    )?;
    let output = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let system = args.system.clone().or_else(|| profile.system.clone());
    let prompt = options::read_prompt(args.prompt.clone())?;

    let mut messages = Vec::new();
    if let Some(system) = &system {
        messages.push(ChatMessage::system(system.clone()));
    }
    messages.push(ChatMessage::user(HumanMessage::new(prompt)));

    if args.verbose {
        eprintln!(
            "provider={} model={model} api_key_present={} tools={}",
            provider.as_str(),
            provider::is_api_key_present(provider),
            registry.len()
        );
    }

    if args.dry_run {
        let body = json!({
            "dry_run": true,
            "provider": provider.as_str(),
            "model": model,
            "messages": messages.iter().map(ChatMessage::to_json).collect::<Vec<_>>(),
            "tools": definitions.iter().map(ToolDefinition::to_json).collect::<Vec<_>>(),
            "request": {
                "temperature": ask_options.temperature,
                "max_tokens": ask_options.max_tokens,
                "timeout_secs": ask_options.timeout_secs,
                "retries": ask_options.retries,
                "retry_delay_ms": ask_options.retry_delay_ms,
            },
        });
        let rendered = serde_json::to_string(&body)
            .map_err(|err| format!("Failed to render output JSON: {err}"))?;
        println!("{rendered}");
        return Ok(());
    }

    let client =
        ChatClient::new(provider, model.as_str(), ask_options).map_err(|err| err.to_string())?;
    let first = client
        .bind_tools(definitions)
        .invoke_messages(&messages)
        .await
        .map_err(|err| err.to_string())?;
    let requested_tools = first.tool_calls.clone();
    messages.push(ChatMessage::assistant_from_ai(&first));

    if !requested_tools.is_empty() {
        for call in &requested_tools {
            if args.verbose {
                eprintln!(
                    "{} {} with {}",
                    "calling".cyan(),
                    call.name.cyan().bold(),
                    call.args_as_string()
                );
            }
            let result = registry.dispatch(call).map_err(|err| err.to_string())?;
            if args.verbose {
                eprintln!("{} {} = {result}", "result".green(), call.name.bold());
            }
            messages.push(ChatMessage::tool_result(
                call.id.clone(),
                format!("{}({}) = {result}", call.name, call.args_as_string()),
            ));
        }

        // second round trip, without tools bound
        let final_message = client
            .invoke_messages(&messages)
            .await
            .map_err(|err| err.to_string())?;
        messages.push(ChatMessage::assistant_from_ai(&final_message));
    }

    match output {
        OutputMode::Text => {
            let answer = messages
                .last()
                .map(|message| message.to_json()["content"].as_str().unwrap_or("").to_string())
                .unwrap_or_default();
            println!("{answer}");
        }
        OutputMode::Json => {
            let transcript: Vec<Value> = messages.iter().map(ChatMessage::to_json).collect();
            let rendered = serde_json::to_string_pretty(&transcript)
                .map_err(|err| format!("Failed to render output JSON: {err}"))?;
            println!("{rendered}");
        }
    }
    Ok(())
}

/// Registers the built-in calculator tools.
fn calculator_tools() -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(
        ToolDefinition::from_function(
            ToolFunction::new("add")
                .with_description("Adds two numbers and returns the sum.")
                .with_param(ToolParam::required("a", "float"))
                .with_param(ToolParam::required("b", "float")),
        ),
        Box::new(|args| {
            let a = number_arg("add", args, "a")?;
            let b = number_arg("add", args, "b")?;
            Ok(json!(a + b))
        }),
    )?;
    registry.register(
        ToolDefinition::from_function(
            ToolFunction::new("multiply")
                .with_description("Multiplies two numbers and returns the product.")
                .with_param(ToolParam::required("a", "float"))
                .with_param(ToolParam::required("b", "float")),
        ),
        Box::new(|args| {
            let a = number_arg("multiply", args, "a")?;
            let b = number_arg("multiply", args, "b")?;
            Ok(json!(a * b))
        }),
    )?;
    Ok(registry)
}
