//! Retry with exponential back-off and jitter for API calls.
//!
//! [`retry_with_backoff`] wraps one request and repeats it on transient
//! failures: timeouts, dropped connections, and HTTP 408, 429 and 5xx.
//! Every other error, including the remaining 4xx statuses, is returned on
//! the first attempt. Requests that must not run twice use
//! [`is_retriable_without_replay`], which only repeats failures the server
//! never acted on.

use std::future::Future;
use std::time::Duration;

use crate::error::ClientError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
pub(crate) fn is_retriable(err: &ClientError) -> bool {
    match err {
        ClientError::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.status().is_some_and(|s| is_retriable_status(s.as_u16()))
        }
        ClientError::Api { status, .. } => is_retriable_status(*status),
        ClientError::Unauthorized
        | ClientError::Deserialize { .. }
        | ClientError::InvalidUrl { .. }
        | ClientError::Validation(_)
        | ClientError::Selection(_)
        | ClientError::LineIndexOutOfRange { .. }
        | ClientError::SubmitInProgress
        | ClientError::Store(_) => false,
    }
}

/// Narrower [`is_retriable`] for requests that create rows: a timeout or a
/// 5xx may arrive after the insert committed, so only refused connections,
/// 408 and 429 are repeated.
pub(crate) fn is_retriable_without_replay(err: &ClientError) -> bool {
    match err {
        ClientError::Http(e) => {
            e.is_connect() || e.status().is_some_and(|s| is_refused_status(s.as_u16()))
        }
        ClientError::Api { status, .. } => is_refused_status(*status),
        _ => false,
    }
}

fn is_refused_status(status: u16) -> bool {
    status == 408 || status == 429
}

fn is_retriable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

/// Attempt budget and delay base for [`retry_with_backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one; at least 1.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 500,
        }
    }
}

/// Runs `operation` up to `policy.max_attempts` times, repeating errors for
/// which `retriable` holds.
///
/// The delay before retry `n` (1-based) is `backoff_base_ms * 2^(n-1)` with
/// ±25 % jitter, capped at 30 s. Non-retriable errors are returned
/// immediately, and the last error is returned once the budget is spent.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    retriable: fn(&ClientError) -> bool,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    const MAX_DELAY_MS: u64 = 30_000;
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !retriable(&err) || attempt >= max_attempts {
                    return Err(err);
                }
                let computed = policy
                    .backoff_base_ms
                    .saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms,
                    error = %err,
                    "transient API error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
        }
    }
}
