use std::time::{Duration, Instant};

/// Last successfully fetched value for an external reading. Stays usable as
/// a fallback after it stops being fresh.
#[derive(Debug, Clone)]
pub struct LastKnown<T> {
    pub value: T,
    pub fetched_at: Instant,
    pub fresh_for: Duration,
}

impl<T: Clone> LastKnown<T> {
    pub fn new(value: T, fresh_for: Duration) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
            fresh_for,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() <= self.fresh_for
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_known_freshness() {
        let entry = LastKnown::new(42u64, Duration::from_millis(10));
        assert!(entry.is_fresh());

        std::thread::sleep(Duration::from_millis(15));
        assert!(!entry.is_fresh());
        assert_eq!(entry.value, 42);
    }

    #[test]
    fn test_zero_ttl_is_never_fresh_after_time_passes() {
        let entry = LastKnown::new("rate".to_string(), Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        assert!(!entry.is_fresh());
    }
}
