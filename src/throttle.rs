//! Per-client request limiting for the public endpoints.
//!
//! Handlers receive a [`RequestCounter`] through app data, so the in-process
//! [`ClientRateLimiter`] can be replaced by a shared store when the service
//! runs as several processes.

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

pub trait RequestCounter: Send + Sync {
    /// Count one request for `key`; returns false once the key is over its limit.
    fn hit(&self, key: &str) -> bool;

    /// Drop keys whose allowance has fully recovered.
    fn purge_expired(&self);
}

/// Keyed GCRA limiter: bursts of up to `max_requests` per key, refilled
/// evenly so a key regains its full allowance one `window` after going quiet.
pub struct ClientRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl ClientRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
        let period = (window / burst.get()).max(Duration::from_nanos(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

impl RequestCounter for ClientRateLimiter {
    fn hit(&self, key: &str) -> bool {
        self.limiter.check_key(&key.to_string()).is_ok()
    }

    fn purge_expired(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn limits_each_key_independently() {
        let limiter = ClientRateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.hit("1.2.3.4"));
        assert!(limiter.hit("1.2.3.4"));
        assert!(!limiter.hit("1.2.3.4"));
        assert!(limiter.hit("5.6.7.8"));
    }

    #[test]
    fn allowance_recovers_after_the_window() {
        let limiter = ClientRateLimiter::new(1, Duration::from_millis(100));
        assert!(limiter.hit("k"));
        assert!(!limiter.hit("k"));
        sleep(Duration::from_millis(150));
        assert!(limiter.hit("k"));
    }

    #[test]
    fn purge_drops_only_recovered_keys() {
        let limiter = ClientRateLimiter::new(1, Duration::from_millis(100));
        limiter.hit("old");
        sleep(Duration::from_millis(150));
        limiter.hit("new");
        limiter.purge_expired();
        assert_eq!(limiter.tracked_keys(), 1);
        assert!(!limiter.hit("new"));
    }

    #[test]
    fn zero_limit_still_admits_one_request() {
        let limiter = ClientRateLimiter::new(0, Duration::from_secs(60));
        assert!(limiter.hit("k"));
        assert!(!limiter.hit("k"));
    }
}
