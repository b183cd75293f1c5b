use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::utils::age_display;

/// A cached value with its write time and staleness flag.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Monotonic write time, used for the freshness window.
    pub timestamp: Instant,
    /// Wall-clock write time, used for display.
    pub cached_at: DateTime<Utc>,
    pub is_stale: bool,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            timestamp: Instant::now(),
            cached_at: Utc::now(),
            is_stale: false,
        }
    }

    /// Checks if this entry is stale, marking it so once the window has passed.
    /// A zero window makes every entry stale immediately.
    pub fn check_staleness(&mut self, freshness_window: Duration) -> bool {
        if self.timestamp.elapsed() >= freshness_window {
            self.is_stale = true;
        }
        self.is_stale
    }

    pub fn mark_stale(&mut self) {
        self.is_stale = true;
    }

    /// Replace the value, resetting timestamp and staleness.
    pub fn update(&mut self, data: T) {
        self.data = data;
        self.timestamp = Instant::now();
        self.cached_at = Utc::now();
        self.is_stale = false;
    }

    pub fn age_display(&self) -> String {
        age_display(self.cached_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_new_entry_is_fresh() {
        let mut entry = CacheEntry::new(42);
        assert_eq!(entry.data, 42);
        assert!(!entry.check_staleness(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_goes_stale_after_window() {
        let mut entry = CacheEntry::new(42);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(entry.check_staleness(Duration::from_secs(30)));
        assert!(entry.is_stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_window_is_immediately_stale() {
        let mut entry = CacheEntry::new("x");
        assert!(entry.check_staleness(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_clears_stale() {
        let mut entry = CacheEntry::new(42);
        entry.mark_stale();
        entry.update(100);
        assert_eq!(entry.data, 100);
        assert!(!entry.is_stale);
        assert_eq!(entry.age_display(), "just now");
    }
}
