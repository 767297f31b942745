//! Retry with exponential back-off and jitter for insights requests.

use std::future::Future;
use std::time::Duration;

use crate::error::SourceError;

/// Upper bound on a single back-off sleep.
const MAX_DELAY_MS: u64 = 60_000;

/// Throttles, 5xx responses and transport failures are retried; API errors,
/// malformed bodies and local errors are returned immediately.
pub(crate) fn is_retriable(err: &SourceError) -> bool {
    match err {
        SourceError::RateLimited(_) | SourceError::Server { .. } => true,
        SourceError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        SourceError::Api { .. }
        | SourceError::Deserialize { .. }
        | SourceError::PaginationLimit { .. }
        | SourceError::InvalidBaseUrl { .. }
        | SourceError::Period(_) => false,
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at [`MAX_DELAY_MS`], then scaled by a jitter factor in `[0.75, 1.25)`.
fn backoff_delay_ms(backoff_base_ms: u64, attempt: u32, jitter: f64) -> u64 {
    let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
    let capped = computed.min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let delay = (capped as f64 * (jitter * 0.5 + 0.75)) as u64;
    delay
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// retriable errors.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay_ms = backoff_delay_ms(backoff_base_ms, attempt, rand::random::<f64>());
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "insights request failed, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
