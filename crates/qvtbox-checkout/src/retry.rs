//! Retry with exponential back-off and jitter for the checkout client.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! transient errors (network failures, 5xx). Provider rejections and
//! malformed responses are returned immediately: retrying cannot fix those,
//! and a shopper is waiting on the other end.

use std::future::Future;
use std::time::Duration;

use crate::error::CheckoutError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - Network-level failures: timeout, connection reset.
/// - HTTP 5xx responses: transient server/infrastructure errors.
///
/// **Not retriable (hard stop):**
/// - [`CheckoutError::Api`]: the provider rejected the payload; resending
///   the same payload gets the same answer.
/// - [`CheckoutError::MissingRedirectUrl`]: the session already exists,
///   creating another one will not repair it.
/// - [`CheckoutError::Deserialize`]: malformed response; retrying won't fix it.
#[must_use]
pub fn is_retriable(err: &CheckoutError) -> bool {
    match err {
        CheckoutError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        CheckoutError::Api(_)
        | CheckoutError::MissingRedirectUrl { .. }
        | CheckoutError::Deserialize { .. } => false,
    }
}

/// Exponential back-off for `attempt` (1-based), capped at 60 s.
fn capped_backoff_ms(backoff_base_ms: u64, attempt: u32) -> u64 {
    const MAX_DELAY_MS: u64 = 60_000;
    backoff_base_ms
        .saturating_mul(1u64 << (attempt - 1).min(10))
        .min(MAX_DELAY_MS)
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// Back-off schedule with `backoff_base_ms = 1_000`:
///
/// | Attempt | Sleep before next attempt        |
/// |---------|----------------------------------|
/// | 1       | 1 000 ms × 2⁰ ± 25 % jitter     |
/// | 2       | 1 000 ms × 2¹ ± 25 % jitter     |
/// | 3       | 1 000 ms × 2² ± 25 % jitter     |
///
/// Delay is capped at 60 s. Non-retriable errors are returned immediately.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-retriable error encountered.
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, CheckoutError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CheckoutError>>,
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
                let capped = capped_backoff_ms(backoff_base_ms, attempt);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "checkout provider transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
