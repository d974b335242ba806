//! Retry with exponential backoff and jitter.
//!
//! Bounded to three attempts total (1s base delay, 10s cap) and restricted
//! to the set of errors the resilient client marks retryable.

use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Computes the exponential-backoff-with-jitter delay before attempt
/// number `attempt` (1-indexed: the delay taken *before* that attempt).
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = config.base_delay.as_millis() as f64 * 2f64.powi(attempt as i32 - 1);
    let capped = exp.min(config.max_delay.as_millis() as f64);
    let jitter_ms = rand::thread_rng().gen_range(0..=(capped * 0.1) as u64);
    Duration::from_millis(capped as u64 - jitter_ms)
}

/// Runs `operation` up to `config.max_attempts` times. `should_retry`
/// decides, given the error, whether another attempt should be made
/// (e.g. transport errors/timeouts/5xx yes, 4xx or `CircuitOpen` no).
pub async fn retry_with<F, Fut, T, E>(
    config: RetryConfig,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= config.max_attempts || !should_retry(&error) {
                    return Err(error);
                }
                let delay = backoff_delay(&config, attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, %error, "retrying after failure");
                sleep(delay).await;
            }
        }
    }
}
