//! Sliding-window-log rate limiter.
//!
//! Tracks, per client key, the timestamps of previously allowed requests.
//! A request is admitted when fewer than `limit` timestamps remain inside
//! the trailing `window`. Rejected requests are not recorded, so a client
//! hammering the gate does not extend its own penalty.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

/// Per-client sliding-window-log admission gate.
///
/// The log form enforces the limit over *any* trailing window, not just
/// aligned buckets: at most `limit` admitted events ever fall inside one
/// `window` span. Capacity for a key frees one slot at a time, exactly
/// when its oldest admission ages past its window.
///
/// # Concurrency
///
/// One exclusive lock guards the whole prune-decide-record sequence for
/// a check. Hold time is a single map access plus a retain over at most
/// `limit` timestamps; no I/O happens inside the lock.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    /// Per-client admission timestamps, oldest first.
    history: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject a request from `client_key` at the current time.
    pub fn allow(&self, client_key: &str) -> bool {
        self.allow_at(client_key, Instant::now())
    }

    /// Admit or reject at an explicit `now`.
    ///
    /// Entries older than the window are pruned on every call, on both
    /// outcomes. `now` is recorded only when the request is admitted.
    pub fn allow_at(&self, client_key: &str, now: Instant) -> bool {
        let mut history = self.history.lock().unwrap();
        let timestamps = history.entry(client_key.to_string()).or_default();

        timestamps.retain(|t| now.saturating_duration_since(*t) < self.window);

        if timestamps.len() >= self.limit {
            warn!(client = client_key, limit = self.limit, "rate limit exceeded");
            return false;
        }

        timestamps.push(now);
        true
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of client keys currently held in the history map.
    pub fn tracked_clients(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    /// Drop clients whose entire history has aged out.
    ///
    /// The per-check prune only touches the key being checked; this sweeps
    /// the rest so idle clients do not accumulate forever. Returns the
    /// number of clients removed.
    pub fn sweep_idle(&self) -> usize {
        let mut history = self.history.lock().unwrap();
        let before = history.len();
        history.retain(|_, timestamps| {
            timestamps
                .last()
                .is_some_and(|t| t.elapsed() < self.window)
        });
        before - history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let now = Instant::now();
        for _ in 0..5 {
            assert!(limiter.allow_at("10.0.0.1", now));
        }
    }

    #[test]
    fn rejects_over_limit_within_window() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let now = Instant::now();
        for _ in 0..5 {
            assert!(limiter.allow_at("10.0.0.1", now));
        }
        assert!(!limiter.allow_at("10.0.0.1", now));
        // Still rejected later in the same window.
        assert!(!limiter.allow_at("10.0.0.1", now + Duration::from_secs(30)));
    }

    #[test]
    fn rejection_is_not_recorded() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let now = Instant::now();
        assert!(limiter.allow_at("k", now));
        assert!(limiter.allow_at("k", now + Duration::from_secs(1)));

        // Hammering while full must not push the recovery point out.
        for i in 2..8 {
            assert!(!limiter.allow_at("k", now + Duration::from_secs(i)));
        }

        // First admission (t=0) ages out at t=10; one slot frees.
        assert!(limiter.allow_at("k", now + Duration::from_secs(10)));
    }

    #[test]
    fn capacity_frees_one_slot_as_oldest_ages_out() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.allow_at("k", now));
        assert!(limiter.allow_at("k", now + Duration::from_secs(10)));
        assert!(limiter.allow_at("k", now + Duration::from_secs(20)));
        assert!(!limiter.allow_at("k", now + Duration::from_secs(30)));

        // t=0 entry expires at t=60: exactly one slot free.
        assert!(limiter.allow_at("k", now + Duration::from_secs(61)));
        assert!(!limiter.allow_at("k", now + Duration::from_secs(62)));
    }

    #[test]
    fn clients_are_independent() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.allow_at("10.0.0.1", now));
        assert!(limiter.allow_at("10.0.0.1", now));
        assert!(!limiter.allow_at("10.0.0.1", now));

        // A different client has its own quota.
        assert!(limiter.allow_at("10.0.0.2", now));
        assert!(limiter.allow_at("10.0.0.2", now));
        assert!(!limiter.allow_at("10.0.0.2", now));
    }

    #[test]
    fn window_boundary_is_exclusive() {
        // An entry exactly `window` old is expired: now - t >= window.
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.allow_at("k", now));
        assert!(!limiter.allow_at("k", now + Duration::from_secs(59)));
        assert!(limiter.allow_at("k", now + Duration::from_secs(60)));
    }

    #[test]
    fn sweep_drops_fully_aged_clients() {
        let limiter = RateLimiter::new(5, Duration::from_millis(1));
        assert!(limiter.allow("a"));
        assert!(limiter.allow("b"));
        assert_eq!(limiter.tracked_clients(), 2);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(limiter.sweep_idle(), 2);
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn sweep_keeps_clients_with_recent_activity() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        assert!(limiter.allow("active"));
        assert_eq!(limiter.sweep_idle(), 0);
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
