use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

const GROQ_TEST_MODEL: &str = "llama-3.3-70b-versatile";

fn lmask_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("lmask"));
    cmd.env_remove("LM_PROVIDER")
        .env_remove("LM_MODEL")
        .env_remove("LM_TEMPERATURE")
        .env_remove("LM_MAX_TOKENS")
        .env_remove("LM_TIMEOUT")
        .env_remove("LM_RETRIES")
        .env_remove("LM_RETRY_DELAY")
        .env_remove("LM_CONFIG")
        .env_remove("GROQ_API_KEY")
        .env_remove("IBM_API_KEY")
        .env_remove("IBM_URL")
        .env_remove("IBM_PROJECT_ID");
    cmd
}

fn unique_temp_path(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("lmask-test-{label}-{nanos}"))
}

fn parse_stdout_json(output: &[u8]) -> Value {
    let text = String::from_utf8(output.to_vec()).expect("stdout should be utf-8");
    serde_json::from_str(text.trim()).expect("stdout should contain valid JSON")
}

#[test]
fn dry_run_succeeds_without_api_key() {
    let assert = lmask_cmd()
        .args([
            "--provider",
            "groq",
            "--model",
            GROQ_TEST_MODEL,
            "--dry-run",
            "2+2?",
        ])
        .assert()
        .success();

    let body = parse_stdout_json(&assert.get_output().stdout);
    assert_eq!(body["dry_run"], Value::Bool(true));
    assert_eq!(body["provider"], Value::String("groq".to_string()));
    assert_eq!(body["model"], Value::String(GROQ_TEST_MODEL.to_string()));
}

#[test]
fn dry_run_show_usage_prints_unavailable() {
    lmask_cmd()
        .args([
            "--provider",
            "groq",
            "--model",
            GROQ_TEST_MODEL,
            "--dry-run",
            "--show-usage",
            "2+2?",
        ])
        .assert()
        .success()
        .stderr(contains("usage: unavailable latency_ms=0 (dry-run)"));
}

#[test]
fn missing_model_returns_explicit_error() {
    lmask_cmd()
        .args(["--provider", "groq", "hello"])
        .assert()
        .failure()
        .stderr(contains("No model provided. Use --model or set LM_MODEL."));
}

#[test]
fn missing_provider_returns_explicit_error() {
    lmask_cmd()
        .args(["--model", GROQ_TEST_MODEL, "hello"])
        .assert()
        .failure()
        .stderr(contains(
            "No provider provided. Use --provider or set LM_PROVIDER.",
        ));
}

#[test]
fn invalid_provider_from_env_returns_error() {
    lmask_cmd()
        .env("LM_PROVIDER", "bad")
        .args(["--model", "x", "hello"])
        .assert()
        .failure()
        .stderr(contains(
            "Invalid LM_PROVIDER 'bad'. Supported values: groq, watsonx.",
        ));
}

#[test]
fn argument_prompt_has_priority_over_stdin() {
    let assert = lmask_cmd()
        .args([
            "--provider",
            "watsonx",
            "--model",
            "meta-llama/llama-3-1-8b-instruct",
            "--dry-run",
            "argument prompt",
        ])
        .write_stdin("stdin prompt")
        .assert()
        .success();

    let body = parse_stdout_json(&assert.get_output().stdout);
    let messages = body["messages"]
        .as_array()
        .expect("messages should be an array");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], Value::String("user".to_string()));
    assert_eq!(
        messages[0]["content"],
        Value::String("argument prompt".to_string())
    );
}

#[test]
fn system_prompt_is_prepended_to_messages() {
    let assert = lmask_cmd()
        .args([
            "--provider",
            "groq",
            "--model",
            GROQ_TEST_MODEL,
            "--system",
            "You are a useful assistant.",
            "--dry-run",
            "2+2?",
        ])
        .assert()
        .success();

    let body = parse_stdout_json(&assert.get_output().stdout);
    let messages = body["messages"]
        .as_array()
        .expect("messages should be an array");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], Value::String("system".to_string()));
    assert_eq!(
        messages[0]["content"],
        Value::String("You are a useful assistant.".to_string())
    );
    assert_eq!(messages[1]["role"], Value::String("user".to_string()));
}

#[test]
fn json_flag_sets_json_output_mode() {
    let assert = lmask_cmd()
        .args([
            "--provider",
            "groq",
            "--model",
            GROQ_TEST_MODEL,
            "--dry-run",
            "--json",
            "hello",
        ])
        .assert()
        .success();

    let body = parse_stdout_json(&assert.get_output().stdout);
    assert_eq!(body["output"], Value::String("json".to_string()));
}

#[test]
fn output_json_sets_json_output_mode() {
    let assert = lmask_cmd()
        .args([
            "--provider",
            "groq",
            "--model",
            GROQ_TEST_MODEL,
            "--dry-run",
            "--output",
            "json",
            "hello",
        ])
        .assert()
        .success();

    let body = parse_stdout_json(&assert.get_output().stdout);
    assert_eq!(body["output"], Value::String("json".to_string()));
}

#[test]
fn profile_loads_provider_and_model_for_dry_run() {
    let config_path = unique_temp_path("config");
    fs::write(
        &config_path,
        "[profiles.gq]\nprovider = \"groq\"\nmodel = \"llama-3.3-70b-versatile\"\n",
    )
    .expect("config should be writable");

    let assert = lmask_cmd()
        .env("LM_CONFIG", &config_path)
        .args(["--profile", "gq", "--dry-run", "hello"])
        .assert()
        .success();

    let body = parse_stdout_json(&assert.get_output().stdout);
    assert_eq!(body["provider"], Value::String("groq".to_string()));
    assert_eq!(body["model"], Value::String(GROQ_TEST_MODEL.to_string()));
}

#[test]
fn profile_is_not_implicit_when_not_passed() {
    let config_path = unique_temp_path("config-no-implicit");
    fs::write(
        &config_path,
        "[profiles.default]\nprovider = \"groq\"\nmodel = \"llama-3.3-70b-versatile\"\n",
    )
    .expect("config should be writable");

    lmask_cmd()
        .env("LM_CONFIG", &config_path)
        .args(["--provider", "groq", "hello"])
        .assert()
        .failure()
        .stderr(contains("No model provided. Use --model or set LM_MODEL."));
}

#[test]
fn save_writes_and_overwrites_output_file() {
    let output_path = unique_temp_path("save-output");

    lmask_cmd()
        .args([
            "--provider",
            "groq",
            "--model",
            GROQ_TEST_MODEL,
            "--dry-run",
            "--save",
            output_path.to_string_lossy().as_ref(),
            "first",
        ])
        .assert()
        .success();

    let first = fs::read_to_string(&output_path).expect("first output file should exist");
    assert!(first.contains("\"content\":\"first\""));

    lmask_cmd()
        .args([
            "--provider",
            "groq",
            "--model",
            GROQ_TEST_MODEL,
            "--dry-run",
            "--save",
            output_path.to_string_lossy().as_ref(),
            "second",
        ])
        .assert()
        .success();

    let second = fs::read_to_string(&output_path).expect("second output file should exist");
    assert!(second.contains("\"content\":\"second\""));
    assert!(!second.contains("\"content\":\"first\""));
}

#[test]
fn save_with_invalid_parent_path_returns_explicit_error() {
    let parent_file = unique_temp_path("save-invalid-parent");
    fs::write(&parent_file, "not a directory").expect("parent marker file should be writable");
    let output_path = parent_file.join("out.json");

    lmask_cmd()
        .args([
            "--provider",
            "groq",
            "--model",
            GROQ_TEST_MODEL,
            "--dry-run",
            "--save",
            output_path.to_string_lossy().as_ref(),
            "hello",
        ])
        .assert()
        .failure()
        .stderr(contains("Failed to create output directory"));
}

#[test]
fn long_prompt_with_max_tokens_is_reflected_in_dry_run_request() {
    let prompt = "x".repeat(24_000);

    let assert = lmask_cmd()
        .args([
            "--provider",
            "groq",
            "--model",
            GROQ_TEST_MODEL,
            "--dry-run",
            "--max-tokens",
            "128",
        ])
        .write_stdin(prompt.clone())
        .assert()
        .success();

    let body = parse_stdout_json(&assert.get_output().stdout);
    let messages = body["messages"]
        .as_array()
        .expect("messages should be an array");

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], Value::String("user".to_string()));
    assert_eq!(messages[0]["content"], Value::String(prompt));
    assert_eq!(body["request"]["max_tokens"], Value::from(128));
}

#[test]
fn precedence_for_temperature_timeout_and_output_is_respected() {
    let config_path = unique_temp_path("precedence-more-options");
    fs::write(
        &config_path,
        "[profiles.gq]\nprovider = \"groq\"\nmodel = \"llama-3.3-70b-versatile\"\ntemperature = 0.1\ntimeout = 7\noutput = \"json\"\n",
    )
    .expect("config should be writable");

    let env_over_profile = lmask_cmd()
        .env("LM_CONFIG", &config_path)
        .env("LM_TEMPERATURE", "0.6")
        .env("LM_TIMEOUT", "21")
        .args(["--profile", "gq", "--dry-run", "hello"])
        .assert()
        .success();

    let env_body = parse_stdout_json(&env_over_profile.get_output().stdout);
    assert_eq!(env_body["request"]["temperature"], json!(0.6));
    assert_eq!(env_body["request"]["timeout_secs"], Value::from(21));
    assert_eq!(env_body["output"], Value::String("json".to_string()));

    let cli_over_env = lmask_cmd()
        .env("LM_CONFIG", &config_path)
        .env("LM_TEMPERATURE", "0.6")
        .env("LM_TIMEOUT", "21")
        .args([
            "--profile",
            "gq",
            "--dry-run",
            "--temperature",
            "1.2",
            "--timeout",
            "33",
            "--output",
            "text",
            "hello",
        ])
        .assert()
        .success();

    let cli_body = parse_stdout_json(&cli_over_env.get_output().stdout);
    assert_eq!(cli_body["request"]["temperature"], json!(1.2));
    assert_eq!(cli_body["request"]["timeout_secs"], Value::from(33));
    assert_eq!(cli_body["output"], Value::String("text".to_string()));
}

#[test]
fn invalid_temperature_from_env_returns_error() {
    lmask_cmd()
        .env("LM_TEMPERATURE", "warm")
        .args([
            "--provider",
            "groq",
            "--model",
            GROQ_TEST_MODEL,
            "--dry-run",
            "hello",
        ])
        .assert()
        .failure()
        .stderr(contains("Invalid LM_TEMPERATURE 'warm'"));
}

#[test]
fn verbose_does_not_leak_api_key() {
    let secret = "groq-secret-value";

    lmask_cmd()
        .env("GROQ_API_KEY", secret)
        .args([
            "--provider",
            "groq",
            "--model",
            GROQ_TEST_MODEL,
            "--dry-run",
            "--verbose",
            "hello",
        ])
        .assert()
        .success()
        .stderr(contains("api_key_present=true").and(contains(secret).not()));
}

#[test]
fn json_flag_overrides_output_text() {
    let assert = lmask_cmd()
        .args([
            "--provider",
            "groq",
            "--model",
            GROQ_TEST_MODEL,
            "--dry-run",
            "--output",
            "text",
            "--json",
            "hello",
        ])
        .assert()
        .success();

    let body = parse_stdout_json(&assert.get_output().stdout);
    assert_eq!(body["output"], Value::String("json".to_string()));
}

#[test]
fn profile_file_missing_returns_explicit_error() {
    let config_path = unique_temp_path("missing-config");

    lmask_cmd()
        .env("LM_CONFIG", &config_path)
        .args(["--profile", "gq", "hello"])
        .assert()
        .failure()
        .stderr(contains("Failed to read config file"));
}

#[test]
fn invalid_profile_toml_returns_parse_error() {
    let config_path = unique_temp_path("invalid-toml");
    fs::write(&config_path, "[profiles.bad\nprovider = \"groq\"")
        .expect("config should be writable");

    lmask_cmd()
        .env("LM_CONFIG", &config_path)
        .args(["--profile", "bad", "hello"])
        .assert()
        .failure()
        .stderr(contains("Failed to parse config file"));
}

#[test]
fn profile_not_found_returns_error() {
    let config_path = unique_temp_path("profile-not-found");
    fs::write(&config_path, "[profiles.gq]\nprovider = \"groq\"\n")
        .expect("config should be writable");

    lmask_cmd()
        .env("LM_CONFIG", &config_path)
        .args(["--profile", "missing", "hello"])
        .assert()
        .failure()
        .stderr(contains("Profile 'missing' not found"));
}
