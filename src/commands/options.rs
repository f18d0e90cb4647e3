//! Option resolution shared by the `ask` and `chat` commands.
//!
//! Precedence is CLI flag, then `LM_*` environment variable, then config
//! profile. Profiles are only consulted when `--profile` was passed.

use std::env;
use std::fmt::Display;
use std::io::Read;
use std::str::FromStr;

use crate::config::{self, ProfileConfig};
use crate::llm::provider::{AskOptions, Provider};

const SUPPORTED_PROVIDERS: &str = "Supported values: groq, watsonx.";

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputMode {
    Text,
    Json,
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }

    fn parse(value: &str, origin: &str) -> Result<Self, String> {
        match value {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "Invalid {origin} '{other}'. Supported values: text, json."
            )),
        }
    }
}

pub(crate) fn load_profile_if_named(profile: Option<&str>) -> Result<ProfileConfig, String> {
    match profile {
        Some(name) => config::load_profile(name),
        None => Ok(ProfileConfig::default()),
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    match env_value(name) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|err| format!("Invalid {name} '{value}': {err}")),
        None => Ok(None),
    }
}

pub(crate) fn resolve_provider(
    flag: Option<&str>,
    profile: &ProfileConfig,
) -> Result<Provider, String> {
    if let Some(value) = flag {
        return Provider::parse(value)
            .ok_or_else(|| format!("Invalid --provider '{value}'. {SUPPORTED_PROVIDERS}"));
    }
    if let Some(value) = env_value("LM_PROVIDER") {
        return Provider::parse(&value)
            .ok_or_else(|| format!("Invalid LM_PROVIDER '{value}'. {SUPPORTED_PROVIDERS}"));
    }
    if let Some(value) = &profile.provider {
        return Provider::parse(value)
            .ok_or_else(|| format!("Invalid profile provider '{value}'. {SUPPORTED_PROVIDERS}"));
    }
    Err("No provider provided. Use --provider or set LM_PROVIDER.".to_string())
}

pub(crate) fn resolve_model(
    flag: Option<String>,
    profile: &ProfileConfig,
) -> Result<String, String> {
    flag.or_else(|| env_value("LM_MODEL"))
        .or_else(|| profile.model.clone())
        .ok_or_else(|| "No model provided. Use --model or set LM_MODEL.".to_string())
}

/// Request knobs shared by `ask` and `chat`, before resolution.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RequestFlags {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    pub retry_delay: Option<u64>,
}

pub(crate) fn resolve_ask_options(
    flags: RequestFlags,
    profile: &ProfileConfig,
) -> Result<AskOptions, String> {
    let defaults = AskOptions::default();
    Ok(AskOptions {
        temperature: match flags.temperature {
            Some(value) => Some(value),
            None => parse_env::<f64>("LM_TEMPERATURE")?.or(profile.temperature),
        },
        max_tokens: match flags.max_tokens {
            Some(value) => Some(value),
            None => parse_env::<u32>("LM_MAX_TOKENS")?.or(profile.max_tokens),
        },
        timeout_secs: match flags.timeout {
            Some(value) => Some(value),
            None => parse_env::<u64>("LM_TIMEOUT")?.or(profile.timeout),
        },
        retries: match flags.retries {
            Some(value) => value,
            None => parse_env::<u32>("LM_RETRIES")?
                .or(profile.retries)
                .unwrap_or(defaults.retries),
        },
        retry_delay_ms: match flags.retry_delay {
            Some(value) => value,
            None => parse_env::<u64>("LM_RETRY_DELAY")?
                .or(profile.retry_delay)
                .unwrap_or(defaults.retry_delay_ms),
        },
    })
}

pub(crate) fn resolve_output(
    json_flag: bool,
    output_flag: Option<&str>,
    profile: &ProfileConfig,
) -> Result<OutputMode, String> {
    if json_flag {
        return Ok(OutputMode::Json);
    }
    if let Some(value) = output_flag {
        return OutputMode::parse(value, "--output");
    }
    if let Some(value) = &profile.output {
        return OutputMode::parse(value, "profile output");
    }
    Ok(OutputMode::Text)
}

/// Takes the positional prompt, falling back to stdin.
pub(crate) fn read_prompt(arg: Option<String>) -> Result<String, String> {
    if let Some(prompt) = arg {
        return Ok(prompt);
    }
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|err| format!("Failed to read prompt from stdin: {err}"))?;
    let prompt = buffer.trim().to_string();
    if prompt.is_empty() {
        return Err("No prompt provided. Pass a prompt argument or pipe stdin.".to_string());
    }
    Ok(prompt)
}
