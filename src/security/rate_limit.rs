//! Fixed-window rate limiting keyed by site and client IP.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Error returned for an invalid limiter configuration.
#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    #[error("invalid limiter configuration: negative limit")]
    NegativeLimit,
}

/// Per-key request count within the current window.
struct Bucket {
    count: i64,
    reset_at: Instant,
}

/// A fixed-window rate limiter.
///
/// Counters reset at fixed wall-clock intervals rather than sliding, so a
/// burst straddling a window boundary can admit up to twice the limit within
/// a duration close to one window. That is the accepted tradeoff for O(1)
/// memory and CPU per check. Keys are never evicted; the bucket map grows
/// with the distinct keys observed over the process lifetime.
pub struct FixedWindowLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    limit: i64,
    window: Duration,
}

impl FixedWindowLimiter {
    /// Create a limiter admitting `limit` calls per key per `window`.
    ///
    /// A zero limit is legal and denies every call; a zero window resets
    /// the counter on every call.
    pub fn new(limit: i64, window: Duration) -> Result<Self, LimiterError> {
        if limit < 0 {
            return Err(LimiterError::NegativeLimit);
        }

        Ok(Self {
            buckets: Mutex::new(HashMap::new()),
            limit,
            window,
        })
    }

    /// Returns true if the call for `key` may proceed within the current
    /// window. Exactly `limit` calls succeed per key per window.
    pub fn allow(&self, key: &str) -> bool {
        let now = Instant::now();

        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            count: 0,
            reset_at: now + self.window,
        });

        if now >= bucket.reset_at {
            *bucket = Bucket {
                count: 0,
                reset_at: now + self.window,
            };
        }

        if bucket.count >= self.limit {
            return false;
        }

        bucket.count += 1;

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn admits_exactly_limit_calls_per_window() {
        let limiter = FixedWindowLimiter::new(5, Duration::from_secs(60)).unwrap();

        for _ in 0..5 {
            assert!(limiter.allow("acme|127.0.0.1"));
        }

        assert!(!limiter.allow("acme|127.0.0.1"));
        assert!(!limiter.allow("acme|127.0.0.1"));
    }

    #[test]
    fn zero_limit_denies_every_call() {
        let limiter = FixedWindowLimiter::new(0, Duration::from_secs(60)).unwrap();

        assert!(!limiter.allow("acme|127.0.0.1"));
    }

    #[test]
    fn negative_limit_is_a_configuration_error() {
        assert!(FixedWindowLimiter::new(-1, Duration::from_secs(60)).is_err());
    }

    #[test]
    fn window_expiry_replaces_the_bucket() {
        let limiter = FixedWindowLimiter::new(2, Duration::from_millis(30)).unwrap();

        assert!(limiter.allow("k"));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));

        std::thread::sleep(Duration::from_millis(40));

        // Exhaustion in the previous window does not carry over.
        assert!(limiter.allow("k"));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60)).unwrap();

        assert!(limiter.allow("acme|10.0.0.1"));
        assert!(!limiter.allow("acme|10.0.0.1"));
        assert!(limiter.allow("acme|10.0.0.2"));
        assert!(limiter.allow("other|10.0.0.1"));
    }

    #[test]
    fn concurrent_distinct_keys_do_not_interfere() {
        let limiter = Arc::new(FixedWindowLimiter::new(100, Duration::from_secs(60)).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    let key = format!("site{i}|10.0.0.{i}");
                    (0..100).filter(|_| limiter.allow(&key)).count()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 100);
        }
    }
}
