use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use serde_json::{json, Value};

use crate::commands::options::{self, OutputMode, RequestFlags};
use crate::llm::provider::{self, AskOptions, AskResponse, ChatMessage, Provider};

#[derive(Debug, Args, Clone)]
pub struct AskArgs {
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
    /// Output mode: text or json.
    #[arg(long)]
    output: Option<String>,
    /// Shorthand for --output json.
    #[arg(long)]
    json: bool,
    /// Write the JSON result to this file.
    #[arg(long)]
    save: Option<PathBuf>,
    /// Report token usage and latency on stderr.
    #[arg(long)]
    show_usage: bool,
    #[arg(long)]
    verbose: bool,
    /// Print the request instead of sending it.
    #[arg(long)]
    dry_run: bool,
    /// Prompt text; read from stdin when absent.
    prompt: Option<String>,
}

pub async fn run(args: AskArgs) -> Result<(), String> {
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
    let output = options::resolve_output(args.json, args.output.as_deref(), &profile)?;
    let show_usage = args.show_usage || profile.show_usage.unwrap_or(false);
    let system = args.system.clone().or_else(|| profile.system.clone());
    let prompt = options::read_prompt(args.prompt.clone())?;

    let mut messages = Vec::new();
    if let Some(system) = &system {
        messages.push(ChatMessage::system(system.clone()));
    }
    messages.push(ChatMessage::user(prompt));

    if args.verbose {
        eprintln!(
            "provider={} model={model} api_key_present={}",
            provider.as_str(),
            provider::is_api_key_present(provider)
        );
    }

    if args.dry_run {
        let body = dry_run_payload(provider, &model, &messages, ask_options, output);
        let rendered = render(&body)?;
        println!("{rendered}");
        if let Some(path) = &args.save {
            write_output(path, &rendered)?;
        }
        if show_usage {
            eprintln!("usage: unavailable latency_ms=0 (dry-run)");
        }
        return Ok(());
    }

    let started = Instant::now();
    let response = provider::ask(provider, &model, &messages, ask_options)
        .await
        .map_err(|err| err.to_string())?;
    let latency_ms = started.elapsed().as_millis() as u64;

    if show_usage {
        report_usage(&response, latency_ms);
    }

    let body = result_payload(provider, &model, &response, latency_ms);
    let rendered = render(&body)?;
    if let Some(path) = &args.save {
        write_output(path, &rendered)?;
    }
    match output {
        OutputMode::Text => println!("{}", response.content),
        OutputMode::Json => println!("{rendered}"),
    }
    Ok(())
}

fn dry_run_payload(
    provider: Provider,
    model: &str,
    messages: &[ChatMessage],
    options: AskOptions,
    output: OutputMode,
) -> Value {
    json!({
        "dry_run": true,
        "provider": provider.as_str(),
        "model": model,
        "messages": messages,
        "request": {
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
            "timeout_secs": options.timeout_secs,
            "retries": options.retries,
            "retry_delay_ms": options.retry_delay_ms,
        },
        "output": output.as_str(),
    })
}

fn result_payload(
    provider: Provider,
    model: &str,
    response: &AskResponse,
    latency_ms: u64,
) -> Value {
    json!({
        "provider": provider.as_str(),
        "model": model,
        "content": response.content,
        "usage": response.usage.as_ref().map(|usage| json!({
            "prompt_tokens": usage.prompt_tokens,
            "completion_tokens": usage.completion_tokens,
            "total_tokens": usage.total_tokens,
        })),
        "latency_ms": latency_ms,
    })
}

fn report_usage(response: &AskResponse, latency_ms: u64) {
    match &response.usage {
        Some(usage) => eprintln!(
            "usage: prompt_tokens={} completion_tokens={} total_tokens={} latency_ms={latency_ms}",
            count(usage.prompt_tokens),
            count(usage.completion_tokens),
            count(usage.total_tokens),
        ),
        None => eprintln!("usage: unavailable latency_ms={latency_ms}"),
    }
}

fn count(value: Option<u32>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

fn render(body: &Value) -> Result<String, String> {
    serde_json::to_string(body).map_err(|err| format!("Failed to render output JSON: {err}"))
}

fn write_output(path: &Path, rendered: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create output directory '{}': {err}",
                    parent.display()
                )
            })?;
        }
    }
    fs::write(path, rendered)
        .map_err(|err| format!("Failed to write output file '{}': {err}", path.display()))
}
