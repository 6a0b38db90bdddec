/*!
 * Utility functions and helpers for Brickwire.
 */
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Run an operation up to `attempts` times, returning the first success.
///
/// Each attempt gets a fresh future from `operation`, which receives the
/// 1-based attempt number. When every attempt fails, the error from the last
/// attempt is returned together with the number of attempts made.
///
/// # Panics
///
/// Panics if `attempts` is zero.
pub async fn with_retry<F, Fut, T, E>(attempts: usize, mut operation: F) -> Result<T, (usize, E)>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    assert!(attempts > 0, "at least one attempt is required");

    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("Succeeded on attempt {}/{}", attempt, attempts);
                }
                return Ok(result);
            }
            Err(e) if attempt >= attempts => {
                warn!("Attempt {}/{} failed, giving up: {}", attempt, attempts, e);
                return Err((attempt, e));
            }
            Err(e) => {
                warn!("Attempt {}/{} failed: {}", attempt, attempts, e);
                attempt += 1;
            }
        }
    }
}

/// Convert a signed millisecond count to a Duration, if it is positive
pub fn positive_millis(millis: i64) -> Option<Duration> {
    u64::try_from(millis)
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}
