//! Bounded retry and failure backoff policy.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::run_flag::RunFlag;

/// Base unit of the linear failure backoff.
pub const BACKOFF_STEP: Duration = Duration::from_secs(60);

/// Consecutive-failure count at which the backoff stops growing.
pub const BACKOFF_CAP_FAILURES: u32 = 5;

// ---

/// Run `op` up to `max_attempts` times, pausing `delay` between attempts.
///
/// The closure receives the 1-based attempt number. The pause is taken on the
/// run flag, so a shutdown during the pause ends the retry early with the
/// last error. `max_attempts` of zero is treated as one.
pub async fn with_retry<T, E, F, Fut>(
    mut op: F,
    max_attempts: u32,
    delay: Duration,
    run_flag: &RunFlag,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    // ---
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                warn!(attempt, max_attempts, error = %e, "Attempt failed, retrying in {:?}", delay);
                if !run_flag.sleep(delay).await {
                    return Err(e);
                }
                attempt += 1;
            }
        }
    }
}

/// Sleep taken after an iteration that ended in failure:
/// `60s × min(consecutive_failures, 5)`.
pub fn failure_backoff(consecutive_failures: u32) -> Duration {
    BACKOFF_STEP * consecutive_failures.min(BACKOFF_CAP_FAILURES)
}
