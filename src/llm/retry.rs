use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tokio::time::sleep;

const MAX_BACKOFF_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub timeout_secs: Option<u64>,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug)]
pub(crate) enum PostFailure {
    Transport(reqwest::Error),
    Status { status: StatusCode, body: String },
}

impl PostFailure {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(source) => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
        }
    }
}

/// POSTs a JSON payload with bearer auth, retrying transient failures.
///
/// Retries only 429/5xx statuses and connect/timeout transport errors, with
/// exponential backoff capped at 30 seconds.
pub(crate) async fn post_json_with_retry<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    bearer_token: &str,
    payload: &T,
    policy: RetryPolicy,
) -> Result<reqwest::Response, PostFailure> {
    let max_attempts = policy.retries.saturating_add(1);

    for attempt in 0..max_attempts {
        let failure = match send_once(client, url, bearer_token, payload, policy.timeout_secs).await
        {
            Ok(response) => return Ok(response),
            Err(failure) => failure,
        };

        if attempt + 1 < max_attempts && failure.is_retryable() {
            sleep(backoff_delay(attempt, policy.retry_delay_ms)).await;
            continue;
        }
        return Err(failure);
    }

    unreachable!("max_attempts is at least one")
}

async fn send_once<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    bearer_token: &str,
    payload: &T,
    timeout_secs: Option<u64>,
) -> Result<reqwest::Response, PostFailure> {
    let mut request = client.post(url).bearer_auth(bearer_token).json(payload);
    if let Some(timeout_secs) = timeout_secs {
        request = request.timeout(Duration::from_secs(timeout_secs));
    }

    let response = request.send().await.map_err(PostFailure::Transport)?;
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(PostFailure::Status { status, body })
}

fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS);
    Duration::from_millis(delay_ms)
}

#[cfg(test)]
mod tests {
    use super::{backoff_delay, PostFailure};
    use reqwest::StatusCode;
    use std::time::Duration;

    fn status_failure(status: StatusCode) -> PostFailure {
        PostFailure::Status {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(0, 200), Duration::from_millis(200));
        assert_eq!(backoff_delay(1, 200), Duration::from_millis(400));
        assert_eq!(backoff_delay(2, 200), Duration::from_millis(800));
    }

    #[test]
    fn backoff_caps_at_thirty_seconds() {
        assert_eq!(backoff_delay(10, 500), Duration::from_millis(30_000));
        assert_eq!(backoff_delay(63, 5_000), Duration::from_millis(30_000));
    }

    #[test]
    fn only_rate_limits_and_server_errors_are_retryable() {
        assert!(status_failure(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(status_failure(StatusCode::INTERNAL_SERVER_ERROR).is_retryable());
        assert!(status_failure(StatusCode::BAD_GATEWAY).is_retryable());

        assert!(!status_failure(StatusCode::BAD_REQUEST).is_retryable());
        assert!(!status_failure(StatusCode::UNAUTHORIZED).is_retryable());
        assert!(!status_failure(StatusCode::NOT_FOUND).is_retryable());
    }
}
