//! Configuration for the data layer.

use std::time::Duration;

/// Tunables for fetching, mutating and scheduled refresh.
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Retry policy for collection fetches.
    pub sync_retry: RetryConfig,
    /// Retry policy for backend writes.
    pub mutation_retry: RetryConfig,
    /// Upper bound for a single backend call.
    pub request_timeout: Duration,
    /// Period of the background refresh loop, if any.
    pub refresh_interval: Option<Duration>,
    /// Number of change events kept for polling subscribers.
    pub feed_history: usize,
}

impl DataConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            sync_retry: RetryConfig::new(3),
            mutation_retry: RetryConfig::new(2),
            request_timeout: Duration::from_secs(15),
            refresh_interval: None,
            feed_history: 1024,
        }
    }

    /// Sets the fetch retry policy.
    pub fn with_sync_retry(mut self, retry: RetryConfig) -> Self {
        self.sync_retry = retry;
        self
    }

    /// Sets the write retry policy.
    pub fn with_mutation_retry(mut self, retry: RetryConfig) -> Self {
        self.mutation_retry = retry;
        self
    }

    /// Sets the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enables the background refresh loop.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Sets how many change events the feed retains.
    pub fn with_feed_history(mut self, history: usize) -> Self {
        self.feed_history = history;
        self
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential backoff for retryable network failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Growth factor between retries.
    pub backoff_multiplier: f64,
    /// Adds up to 25% on top of each delay.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a policy with `max_attempts` total attempts.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// A single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Turns jitter on or off.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.add_jitter = enabled;
        self
    }

    /// Whether another attempt is allowed after `attempts` have been made.
    pub fn allows_another(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before attempt number `attempt` (0-indexed; the first attempt never waits).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = (self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent))
            .min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            Duration::from_secs_f64(secs * (1.0 + 0.25 * jitter_fraction()))
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

// Clock-derived fraction in [0, 1).
fn jitter_fraction() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_config_defaults() {
        let config = DataConfig::default();
        assert_eq!(config.sync_retry.max_attempts, 3);
        assert_eq!(config.mutation_retry.max_attempts, 2);
        assert!(config.refresh_interval.is_none());
    }

    #[test]
    fn data_config_builder() {
        let config = DataConfig::new()
            .with_sync_retry(RetryConfig::no_retry())
            .with_request_timeout(Duration::from_secs(2))
            .with_refresh_interval(Duration::from_secs(60))
            .with_feed_history(16);

        assert_eq!(config.sync_retry.max_attempts, 1);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.refresh_interval, Some(Duration::from_secs(60)));
        assert_eq!(config.feed_history, 16);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(400))
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(9), Duration::from_millis(400));
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let config = RetryConfig::new(3).with_initial_delay(Duration::from_millis(100));
        let delay = config.delay_for_attempt(1);
        assert!(delay >= Duration::from_millis(100));
        assert!(delay <= Duration::from_millis(125));
    }

    #[test]
    fn attempts_budget() {
        let config = RetryConfig::new(2);
        assert!(config.allows_another(1));
        assert!(!config.allows_another(2));
        assert!(!RetryConfig::no_retry().allows_another(1));
        assert_eq!(RetryConfig::new(0).max_attempts, 1);
    }
}
