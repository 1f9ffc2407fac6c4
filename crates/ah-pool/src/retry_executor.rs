//! Retry executor (§4.A): retries a fallible async operation using the
//! shared `ah_common::RetryPolicy` backoff formula, stopping on first
//! success, on exhaustion, when the error is non-retryable, or when the
//! supplied cancellation token fires.

use std::future::Future;
use std::time::Duration;

use ah_common::{RetryPolicy, TransientErrorKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::PoolError;

/// Classifies a `sqlx::Error` into the retryable taxonomy (§4.A), falling
/// back to timeout detection for errors without a `SQLSTATE` code.
pub fn classify(err: &sqlx::Error) -> Option<TransientErrorKind> {
    match err {
        sqlx::Error::PoolTimedOut => Some(TransientErrorKind::Timeout),
        sqlx::Error::Io(_) => Some(TransientErrorKind::ConnectionFailure),
        sqlx::Error::Database(db_err) => db_err.code().and_then(|code| TransientErrorKind::from_sqlstate(&code)),
        _ => None,
    }
}

/// Run `op` under the given retry policy. `op` is invoked at least once.
pub async fn execute<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, PoolError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut delay = policy.initial_delay;
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(PoolError::Timeout);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = classify(&err);
                attempt += 1;

                if retryable.is_none() {
                    debug!(error = %err, "non-retryable database error");
                    return Err(PoolError::Database(err));
                }

                if attempt > policy.max_retries {
                    warn!(error = %err, attempt, "retry executor exhausted");
                    return Err(PoolError::Database(err));
                }

                let sleep_for = policy.jittered(delay);
                debug!(error = %err, attempt, ?sleep_for, "retrying database operation");

                tokio::select! {
                    _ = tokio::time::sleep(sleep_for) => {}
                    _ = cancel.cancelled() => return Err(PoolError::Timeout),
                }

                delay = policy.advance(delay);
            }
        }
    }
}

pub fn default_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 5,
        initial_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(10),
        backoff_factor: 2.0,
        jitter_factor: 0.1,
    }
}
