//! Retry and pacing utilities shared by the source pipelines.
//!
//! Only transient transport failures (proxy errors, connection resets,
//! timeouts) are retried. A 429 is a hard stop for the attempt and surfaces
//! to the caller unchanged, as do parse and status errors.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::ScraperError;

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// `max_retries` retries are spent.
///
/// The wait before the n-th retry is `backoff_base_secs * 2^(n-1)` seconds,
/// so `max_retries = 3` with base 1 sleeps 1 s, 2 s and 4 s across at most
/// four attempts.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    for retry in 0..max_retries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient_transport() => {
                let wait = backoff_delay(backoff_base_secs, retry);
                tracing::warn!(
                    retry = retry + 1,
                    max_retries,
                    wait_secs = wait.as_secs(),
                    error = %err,
                    "proxy error, retrying after backoff"
                );
                tokio::time::sleep(wait).await;
            }
            Err(err) => return Err(err),
        }
    }
    operation().await
}

fn backoff_delay(base_secs: u64, retry: u32) -> Duration {
    Duration::from_secs(base_secs.saturating_mul(1u64 << retry.min(62)))
}

/// Sleeps for a uniformly random whole number of seconds in `[min_secs, max_secs]`.
pub(crate) async fn human_pause(min_secs: u64, max_secs: u64) {
    if max_secs == 0 {
        return;
    }
    let secs = if min_secs >= max_secs {
        max_secs
    } else {
        rand::rng().random_range(min_secs..=max_secs)
    };
    tracing::debug!(secs, "pausing before next request");
    tokio::time::sleep(Duration::from_secs(secs)).await;
}
