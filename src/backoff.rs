use crate::config::{LifecycleConfig, DEFAULT_BACKOFF_MS};
use crate::error::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

pub const DEFAULT_SERVE_RETRIES: u32 = 3;
pub const DEFAULT_FORWARD_RETRIES: u32 = 10;

/// Retry limits and base delay shared by peer-listener binding and forwarding
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Base delay, scaled by attempt number and jitter
    pub base_delay: Duration,
    /// Additional bind attempts after the first
    pub serve_retries: u32,
    /// Additional delivery attempts after the first
    pub forward_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_BACKOFF_MS),
            serve_retries: DEFAULT_SERVE_RETRIES,
            forward_retries: DEFAULT_FORWARD_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Build a policy from configuration. A configured zero selects the
    /// default, any negative count disables retries.
    pub fn from_config(config: &LifecycleConfig) -> Self {
        let base_delay = if config.backoff_ms == 0 {
            Duration::from_millis(DEFAULT_BACKOFF_MS)
        } else {
            Duration::from_millis(config.backoff_ms)
        };

        Self {
            base_delay,
            serve_retries: normalize_retries(config.serve_retries, DEFAULT_SERVE_RETRIES),
            forward_retries: normalize_retries(config.forward_retries, DEFAULT_FORWARD_RETRIES),
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        backoff_delay(self.base_delay, attempt)
    }
}

fn normalize_retries(configured: i32, default: u32) -> u32 {
    match configured {
        0 => default,
        n if n < 0 => 0,
        n => n as u32,
    }
}

/// Jittered, linearly growing delay for retry `attempt` (zero-based)
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = rand::thread_rng().gen_range(0.5..1.5);
    scaled_delay(base, attempt, factor)
}

/// `base × (attempt + 1) × factor`
pub fn scaled_delay(base: Duration, attempt: u32, factor: f64) -> Duration {
    let try_number = f64::from(attempt) + 1.0;
    Duration::from_secs_f64(base.as_secs_f64() * try_number * factor)
}

/// Run `operation` up to `retries + 1` times, sleeping a backoff delay
/// between failed attempts. Returns the last error if every attempt fails.
pub async fn retry<T, F, Fut>(what: &str, retries: u32, base: Duration, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", what, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < retries => {
                let delay = backoff_delay(base, attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt + 1,
                    retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShutdownError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_scaled_delay_grows_linearly() {
        let base = Duration::from_millis(500);

        assert_eq!(scaled_delay(base, 0, 1.0), Duration::from_millis(500));
        assert_eq!(scaled_delay(base, 1, 1.0), Duration::from_millis(1000));
        assert_eq!(scaled_delay(base, 3, 0.5), Duration::from_millis(1000));
        assert_eq!(scaled_delay(base, 0, 1.5), Duration::from_millis(750));
    }

    #[test]
    fn test_backoff_delay_stays_within_jitter_range() {
        let base = Duration::from_millis(100);
        for attempt in 0..5 {
            let delay = backoff_delay(base, attempt);
            let low = scaled_delay(base, attempt, 0.5);
            let high = scaled_delay(base, attempt, 1.5);
            assert!(delay >= low && delay <= high, "{:?} outside {:?}..{:?}", delay, low, high);
        }
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = LifecycleConfig::default();
        config.backoff_ms = 0;
        assert_eq!(RetryPolicy::from_config(&config), RetryPolicy::default());

        config.backoff_ms = 20;
        config.serve_retries = -1;
        config.forward_retries = 4;
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.base_delay, Duration::from_millis(20));
        assert_eq!(policy.serve_retries, 0);
        assert_eq!(policy.forward_retries, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result = retry("flaky", 3, Duration::from_millis(10), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(ShutdownError::system("not yet"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_with_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry("broken", 2, Duration::from_millis(10), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(ShutdownError::system(format!("failure {}", attempt))) }
        })
        .await;

        assert!(matches!(result, Err(ShutdownError::System { ref message }) if message == "failure 2"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_makes_one_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry("once", 0, Duration::from_secs(60), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ShutdownError::system("down")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
