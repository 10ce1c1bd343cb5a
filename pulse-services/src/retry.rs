//! Retry policy for upstream calls
//!
//! Absorbs rate-limit errors with bounded exponential backoff: 3 retries,
//! 5s initial delay, doubling each round (5s, 10s, 20s). Any other error
//! class fails fast, and exhausted retries propagate the last error.
//!
//! The policy wraps a single task inside the serial queue's slot; retries
//! never requeue, so backed-off attempts do not interleave with other
//! queued tasks.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use pulse_core::PulseResult;

/// Maximum number of retries after the initial attempt
pub const MAX_RETRIES: u32 = 3;

/// Delay before the first retry; doubles each round
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Run `attempt`, retrying rate-limited failures with exponential backoff
pub async fn with_retry<T, F, Fut>(
    mut attempt: F,
    max_retries: u32,
    initial_delay: Duration,
) -> PulseResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PulseResult<T>>,
{
    let mut retries_left = max_retries;
    let mut delay = initial_delay;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() && retries_left > 0 => {
                warn!(
                    "Upstream rate limited, retrying in {:?} ({} retries left): {}",
                    delay, retries_left, err
                );
                tokio::time::sleep(delay).await;
                retries_left -= 1;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}
