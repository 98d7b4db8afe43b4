use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitResult {
    /// Whether the request is allowed.
    pub allowed: bool,
    /// Maximum requests allowed in this window.
    pub limit: u32,
    /// Requests remaining in the current window (0 when denied).
    pub remaining: u32,
    /// Seconds until the current window resets.
    pub reset_after_secs: u64,
}

/// Counter for one key: calls made since `started`.
#[derive(Debug, Clone, Copy)]
struct Window {
    calls: u32,
    started: Instant,
}

/// Per-key fixed-window rate limiter.
///
/// Each key gets `max_per_window` calls per window. The window opens on the
/// first call for a key and the counter resets once it has elapsed.
pub struct RateLimiter<K: Eq + Hash> {
    window: Mutex<HashMap<K, Window>>,
    max_per_window: u32,
    window_duration: Duration,
}

impl<K: Eq + Hash> RateLimiter<K> {
    /// Evict expired entries once the map exceeds this many keys.
    const EVICTION_THRESHOLD: usize = 10_000;

    pub fn new(max_per_window: u32, window_secs: u64) -> Self {
        Self {
            window: Mutex::new(HashMap::new()),
            max_per_window,
            window_duration: Duration::from_secs(window_secs),
        }
    }

    pub fn per_minute(max: u32) -> Self {
        Self::new(max, 60)
    }

    pub fn per_hour(max: u32) -> Self {
        Self::new(max, 3600)
    }

    fn result(&self, allowed: bool, calls: u32, elapsed: Duration) -> RateLimitResult {
        RateLimitResult {
            allowed,
            limit: self.max_per_window,
            remaining: self.max_per_window.saturating_sub(calls),
            reset_after_secs: self.window_duration.saturating_sub(elapsed).as_secs(),
        }
    }

    /// Record a call for `key` and report whether it fits in the window.
    // `guard` must outlive `entry` because `entry` borrows from the map behind the lock.
    #[allow(clippy::significant_drop_tightening)]
    pub fn check_and_increment(&self, key: K) -> RateLimitResult {
        let now = Instant::now();
        let mut guard = self
            .window
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if guard.len() > Self::EVICTION_THRESHOLD {
            guard.retain(|_, w| now.duration_since(w.started) < self.window_duration);
        }

        let entry = guard.entry(key).or_insert(Window {
            calls: 0,
            started: now,
        });

        if now.duration_since(entry.started) >= self.window_duration {
            *entry = Window {
                calls: 0,
                started: now,
            };
        }

        let elapsed = now.duration_since(entry.started);
        if entry.calls >= self.max_per_window {
            return self.result(false, self.max_per_window, elapsed);
        }
        entry.calls += 1;
        self.result(true, entry.calls, elapsed)
    }
}

/// Rate limiter keyed by client IP address; used for login, OTP and chat.
pub type IpRateLimiter = RateLimiter<String>;

/// Rate limiter keyed by normalized email; caps OTP re-sends per account.
pub type EmailRateLimiter = RateLimiter<String>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ip(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn allows_calls_within_limit() {
        let limiter = IpRateLimiter::new(3, 60);
        for _ in 0..3 {
            assert!(limiter.check_and_increment(ip("10.0.0.1")).allowed);
        }
    }

    #[test]
    fn blocks_calls_over_limit() {
        let limiter = IpRateLimiter::new(2, 60);
        assert!(limiter.check_and_increment(ip("10.0.0.1")).allowed);
        assert!(limiter.check_and_increment(ip("10.0.0.1")).allowed);
        assert!(!limiter.check_and_increment(ip("10.0.0.1")).allowed);
        assert!(!limiter.check_and_increment(ip("10.0.0.1")).allowed);
    }

    #[test]
    fn different_keys_are_independent() {
        let limiter = EmailRateLimiter::new(1, 3600);
        assert!(limiter.check_and_increment(ip("a@college.edu")).allowed);
        assert!(!limiter.check_and_increment(ip("a@college.edu")).allowed);
        assert!(limiter.check_and_increment(ip("b@college.edu")).allowed);
    }

    #[test]
    fn zero_limit_denies_everything() {
        let limiter = IpRateLimiter::new(0, 60);
        let r = limiter.check_and_increment(ip("10.0.0.1"));
        assert!(!r.allowed);
        assert_eq!(r.remaining, 0);
    }

    #[test]
    fn result_remaining_decrements_correctly() {
        let limiter = IpRateLimiter::new(3, 60);
        let r1 = limiter.check_and_increment(ip("1.1.1.1"));
        assert_eq!(r1.remaining, 2);
        assert_eq!(r1.limit, 3);
        assert_eq!(limiter.check_and_increment(ip("1.1.1.1")).remaining, 1);
        let r3 = limiter.check_and_increment(ip("1.1.1.1"));
        assert_eq!(r3.remaining, 0);
        assert!(r3.allowed);
        let r4 = limiter.check_and_increment(ip("1.1.1.1"));
        assert_eq!(r4.remaining, 0);
        assert!(!r4.allowed);
    }

    #[test]
    fn result_reset_after_within_window() {
        let limiter = IpRateLimiter::new(10, 3600);
        let r = limiter.check_and_increment(ip("1.1.1.1"));
        assert!(r.reset_after_secs <= 3600);
        assert!(r.reset_after_secs >= 3599);
    }

    #[test]
    fn eviction_removes_expired_entries() {
        let limiter = IpRateLimiter::new(100, 1);

        for i in 0..=IpRateLimiter::EVICTION_THRESHOLD {
            limiter.check_and_increment(format!("10.0.{}.{}", i / 256, i % 256));
        }
        let count_before = limiter.window.lock().unwrap().len();
        assert!(count_before > IpRateLimiter::EVICTION_THRESHOLD);

        std::thread::sleep(std::time::Duration::from_millis(1100));

        limiter.check_and_increment("trigger".to_string());
        let count_after = limiter.window.lock().unwrap().len();
        assert_eq!(count_after, 1, "only 'trigger' should remain");
    }
}
