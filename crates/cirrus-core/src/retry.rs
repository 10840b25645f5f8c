//! Retry policy: backoff between attempts of a throttled call.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with an upper bound.
///
/// delay = min(base_delay * multiplier^(attempts - 1) * r, max_delay)
///
/// `r` is drawn from `[1, 2)` when `randomize` is set, otherwise 1.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Growth factor between consecutive retries.
    pub multiplier: f64,

    /// Upper bound of a single delay.
    pub max_delay: Duration,

    /// Retries after the first attempt; 0 disables retrying.
    pub max_retries: u32,

    pub randomize: bool,
}

impl Default for RetryPolicy {
    /// 1s, ×1.5, capped at 10s, 10 retries, randomized.
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 1.5,
            max_delay: Duration::from_secs(10),
            max_retries: 10,
            randomize: true,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempts` retries.
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_retries
    }

    /// Delay before retry number `attempts` (1-indexed).
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let jitter = if self.randomize {
            rand::thread_rng().gen_range(1.0..2.0)
        } else {
            1.0
        };
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent) * jitter;
        // powi が inf になっても上限で抑える
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}
