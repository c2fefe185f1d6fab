//! Async retry executor driven by a [`RetryPolicy`].

use anyhow::Result;
use std::future::Future;
use sweep_core::{RetryPolicy, SweepError};
use tracing::warn;

/// Whether an error is worth another attempt.
///
/// Retryable errors are core [`SweepError`]s that report themselves as
/// transient; everything else is fatal on first sight.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SweepError>()
        .is_some_and(SweepError::is_retryable)
}

/// Run `op` until it succeeds, fails fatally, or the policy runs out of attempts.
///
/// The last error is returned unchanged once attempts are exhausted.
pub async fn retry_async<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) && policy.should_retry(attempt) => {
                let delay = {
                    let mut rng = rand::rng();
                    policy.delay_for_attempt(attempt, &mut rng)
                };
                warn!(
                    "{} failed (attempt {}/{}): {:#}; retrying in {:?}",
                    label, attempt, policy.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
