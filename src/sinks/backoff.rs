//! Reconnect backoff for network sinks.
//!
//! After a failed send the sink stops trying for a window that doubles on
//! every consecutive failure, up to a cap. Records arriving inside the
//! window are dropped and counted; the next success closes the window.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    failures: u32,
    until: Option<Instant>,
    dropped: u64,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            failures: 0,
            until: None,
            dropped: 0,
        }
    }

    /// Whether sends are suspended at `now`. A suspended caller must drop
    /// its record through [`ReconnectBackoff::drop_record`].
    pub fn is_suspended(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    pub fn drop_record(&mut self) {
        self.dropped += 1;
    }

    /// Open the next window and return its length.
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        let factor = 1u32.checked_shl(self.failures.min(16)).unwrap_or(u32::MAX);
        let delay = self.initial.saturating_mul(factor).min(self.max);
        self.failures = self.failures.saturating_add(1);
        self.until = Some(now + delay);
        delay
    }

    /// Close the window. Returns how many records it dropped, if one was open.
    pub fn record_success(&mut self) -> Option<u64> {
        if self.failures == 0 {
            return None;
        }
        self.failures = 0;
        self.until = None;
        Some(std::mem::take(&mut self.dropped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_doubles_up_to_cap() {
        let mut backoff = ReconnectBackoff::new(Duration::from_secs(1), Duration::from_secs(5));
        let now = Instant::now();

        assert_eq!(backoff.record_failure(now), Duration::from_secs(1));
        assert_eq!(backoff.record_failure(now), Duration::from_secs(2));
        assert_eq!(backoff.record_failure(now), Duration::from_secs(4));
        assert_eq!(backoff.record_failure(now), Duration::from_secs(5));
        assert_eq!(backoff.record_failure(now), Duration::from_secs(5));
    }

    #[test]
    fn test_suspended_only_inside_window() {
        let mut backoff = ReconnectBackoff::new(Duration::from_secs(1), Duration::from_secs(30));
        let now = Instant::now();
        assert!(!backoff.is_suspended(now));

        backoff.record_failure(now);
        assert!(backoff.is_suspended(now + Duration::from_millis(999)));
        assert!(!backoff.is_suspended(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_success_reports_dropped_and_resets() {
        let mut backoff = ReconnectBackoff::new(Duration::from_secs(1), Duration::from_secs(30));
        let now = Instant::now();
        assert_eq!(backoff.record_success(), None);

        backoff.record_failure(now);
        backoff.drop_record();
        backoff.drop_record();
        assert_eq!(backoff.record_success(), Some(2));
        assert!(!backoff.is_suspended(now));
        assert_eq!(backoff.record_failure(now), Duration::from_secs(1));
    }
}
