//! Runs an operation under a [`RetryPolicy`], honoring cooperative
//! cancellation and the non-retryable error short-circuit (§4.3: "validation,
//! config, unauthorized, forbidden, not-found ... must short-circuit
//! retry").

use std::future::Future;
use std::time::{Duration, Instant};

use relay_error::RelayError;
use tokio_util::sync::CancellationToken;

use crate::policy::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryStats {
    pub attempts: u32,
    pub total_duration: Duration,
}

/// Adds up to 10% jitter to a backoff delay so concurrently retrying
/// branches don't all wake up in lockstep.
fn jittered(delay: Duration) -> Duration {
    let jitter_fraction = rand::random::<f64>() * 0.1;
    let millis = delay.as_millis() as f64 * (1.0 + jitter_fraction);
    Duration::from_millis(millis as u64)
}

/// Runs `op` up to `policy.max_attempts` times. Returns as soon as `op`
/// succeeds, as soon as it returns a non-retryable error, or once
/// cancellation fires; otherwise returns `RelayError::RetryExhausted` after
/// the last attempt.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancellation: &CancellationToken,
    mut op: F,
) -> Result<(T, RetryStats), RelayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RelayError>>,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if cancellation.is_cancelled() {
            return Err(RelayError::cancelled(relay_error::CancelReason::UserCancelled));
        }

        match op().await {
            Ok(value) => {
                return Ok((
                    value,
                    RetryStats {
                        attempts: attempt,
                        total_duration: started.elapsed(),
                    },
                ))
            }
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                if attempt >= policy.max_attempts {
                    return Err(RelayError::retry_exhausted(attempt, err.to_string()));
                }
            }
        }

        let delay = jittered(policy.delay_for(attempt));
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancellation.cancelled() => {
                return Err(RelayError::cancelled(relay_error::CancelReason::UserCancelled));
            }
        }
    }
}
