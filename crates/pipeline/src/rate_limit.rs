use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use voice_agent_config::RateLimitConfig;

/// Process-wide rolling-window quota on LLM calls. `allow()` and `record()`
/// are separate operations, the way the spec's Phase A admission check
/// composes them: check, and only if the turn actually proceeds, record.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    records: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_seconds),
            records: Mutex::new(VecDeque::new()),
        }
    }

    fn prune(&self, records: &mut VecDeque<Instant>, now: Instant) {
        while let Some(front) = records.front() {
            if now.saturating_duration_since(*front) >= self.window {
                records.pop_front();
            } else {
                break;
            }
        }
    }

    /// Prunes expired entries and reports whether another call is allowed.
    pub fn allow(&self) -> bool {
        let now = Instant::now();
        let mut records = self.records.lock();
        self.prune(&mut records, now);
        records.len() < self.max_requests as usize
    }

    /// Records an accepted call. Callers must have already called
    /// `allow()` and gotten `true`.
    pub fn record(&self) {
        let now = Instant::now();
        let mut records = self.records.lock();
        self.prune(&mut records, now);
        records.push_back(now);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.records.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: u32, window_secs: u64) -> RateLimitConfig {
        RateLimitConfig { max_requests: max, window_seconds: window_secs }
    }

    #[test]
    fn allows_up_to_max_requests() {
        let limiter = RateLimiter::new(&config(3, 3600));
        for _ in 0..3 {
            assert!(limiter.allow());
            limiter.record();
        }
        assert!(!limiter.allow());
        assert_eq!(limiter.len(), 3);
    }

    #[test]
    fn prunes_entries_older_than_window() {
        let limiter = RateLimiter::new(&config(1, 1));
        assert!(limiter.allow());
        limiter.record();
        assert!(!limiter.allow());
        std::thread::sleep(Duration::from_millis(1100));
        assert!(limiter.allow());
    }
}
