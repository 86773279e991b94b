//! Retry policy and the delay seam used between attempts.

use crate::models::{Backoff, MAX_RETRY_DELAY_SECS, RetryConfig};
use async_trait::async_trait;
use std::time::Duration;

/// Bounded retry policy for a single record.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub delay: Duration,
    pub backoff: Backoff,
    /// Growth factor for exponential backoff
    pub factor: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    /// Out-of-range or non-finite values fall back to the defaults.
    fn from(config: &RetryConfig) -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: seconds(config.delay_secs, defaults.delay_secs),
            backoff: config.backoff,
            factor: if config.factor.is_finite() {
                config.factor
            } else {
                defaults.factor
            },
            max_delay: seconds(config.max_delay_secs, defaults.max_delay_secs),
        }
    }
}

fn seconds(secs: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_RETRY_DELAY_SECS))
        .unwrap_or_else(|_| Duration::from_secs_f64(fallback))
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `None` once the attempt budget is spent.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let delay = match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let exp = attempt.saturating_sub(1).min(31) as i32;
                let secs = self.delay.as_secs_f64() * self.factor.powi(exp);
                if secs.is_finite() && secs < self.max_delay.as_secs_f64() {
                    Duration::from_secs_f64(secs.max(0.0))
                } else {
                    self.max_delay
                }
            }
        };
        Some(delay.min(self.max_delay))
    }
}

/// Blocks the processor between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real delays on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn test_exponential_delays_are_capped() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_attempts: 6,
            delay_secs: 1.0,
            backoff: Backoff::Exponential,
            factor: 3.0,
            max_delay_secs: 10.0,
        });
        let delays: Vec<_> = (1..6).filter_map(|a| policy.delay_after(a)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(9),
                Duration::from_secs(10),
                Duration::from_secs(10),
            ]
        );
        assert_eq!(policy.delay_after(6), None);
    }

    #[test]
    fn test_single_attempt_never_waits() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        };
        assert_eq!(policy.delay_after(1), None);
    }

    #[test]
    fn test_unbounded_config_values_do_not_panic() {
        let policy = RetryPolicy::from(&RetryConfig {
            delay_secs: f64::INFINITY,
            max_delay_secs: f64::NAN,
            factor: f64::INFINITY,
            ..Default::default()
        });
        assert_eq!(policy.delay, Duration::from_secs(86_400));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert_eq!(policy.factor, 2.0);

        let huge = RetryPolicy::from(&RetryConfig {
            delay_secs: 1e20,
            ..Default::default()
        });
        assert_eq!(huge.delay, Duration::from_secs(86_400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_advances_clock() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(5)).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
