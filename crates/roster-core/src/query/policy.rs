use std::time::Duration;

/// Retry delays start here and double per attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for a single retry delay.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Per-entry cache policy.
///
/// This controls how long an entry is served without refetching, how long an
/// idle entry is retained, whether the previous value stays visible while a
/// refetch runs, and how many extra attempts a failed fetch gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPolicy {
    /// How long data is considered fresh after it was written.
    ///
    /// Within the window a fetch of the same key returns the cached value
    /// without a network call.
    pub freshness_window: Duration,

    /// How long an entry that nobody reads is retained before the sweep
    /// removes it.
    pub eviction_window: Duration,

    /// Serve the last known value immediately when it is stale, refetching in
    /// the background.
    pub keep_previous_on_refetch: bool,

    /// Additional attempts after a transient failure.
    pub retry_count: u32,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(0),     // immediately stale
            eviction_window: Duration::from_secs(5 * 60), // 5 minutes
            keep_previous_on_refetch: false,
            retry_count: 3,
        }
    }
}

impl QueryPolicy {
    #[must_use]
    pub fn new(freshness_window: Duration, eviction_window: Duration) -> Self {
        Self {
            freshness_window,
            eviction_window,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn keep_previous_on_refetch(mut self, keep: bool) -> Self {
        self.keep_previous_on_refetch = keep;
        self
    }

    #[must_use]
    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// Delay before retry number `attempt` (zero-based): 1s, 2s, 4s, ... capped at 30s.
    pub fn retry_delay(attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        RETRY_BASE_DELAY
            .checked_mul(factor)
            .map_or(RETRY_MAX_DELAY, |delay| delay.min(RETRY_MAX_DELAY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = QueryPolicy::default();
        assert_eq!(policy.freshness_window, Duration::from_secs(0));
        assert_eq!(policy.eviction_window, Duration::from_secs(5 * 60));
        assert!(!policy.keep_previous_on_refetch);
        assert_eq!(policy.retry_count, 3);
    }

    #[test]
    fn test_builder() {
        let policy = QueryPolicy::new(Duration::from_secs(30), Duration::from_secs(300))
            .keep_previous_on_refetch(true)
            .retry_count(0);
        assert_eq!(policy.freshness_window, Duration::from_secs(30));
        assert!(policy.keep_previous_on_refetch);
        assert_eq!(policy.retry_count, 0);
    }

    #[test]
    fn test_retry_delay_backoff() {
        assert_eq!(QueryPolicy::retry_delay(0), Duration::from_secs(1));
        assert_eq!(QueryPolicy::retry_delay(1), Duration::from_secs(2));
        assert_eq!(QueryPolicy::retry_delay(4), Duration::from_secs(16));
        assert_eq!(QueryPolicy::retry_delay(5), Duration::from_secs(30));
        assert_eq!(QueryPolicy::retry_delay(40), Duration::from_secs(30));
    }
}
