//! Per-username sign-in throttling.
//!
//! Each username gets `max_attempts` sign-in attempts per fixed window that
//! starts at the first attempt. The record lives in a [`TtlCache`] whose TTL is
//! the window, so it disappears on its own once the window is over.

use std::time::Duration;

use super::cache::TtlCache;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// `retry_after` is the rest of the window, rounded up to whole minutes.
    Limited { retry_after: Duration },
}

#[derive(Debug)]
pub struct AttemptThrottle {
    attempts: TtlCache<String, ()>,
    window: Duration,
    max_attempts: u64,
}

impl AttemptThrottle {
    #[must_use]
    pub fn new(window: Duration, max_attempts: u32) -> Self {
        Self {
            attempts: TtlCache::new(),
            window,
            max_attempts: u64::from(max_attempts),
        }
    }

    /// Count one attempt for `name` and decide whether it may proceed.
    ///
    /// Check and increment happen under the cache lock, so concurrent attempts
    /// for the same name cannot both slip under the limit.
    pub async fn check_and_record(&self, name: &str) -> RateLimitDecision {
        let item = self.attempts.hit(name.to_string(), self.window, || ()).await;

        // The cache already expires records after one window; the age check
        // still restarts the window should a stale record ever be returned.
        let age = item.created_on().elapsed();
        let (attempts, remaining) = if age >= self.window {
            self.attempts.add(name.to_string(), self.window, ()).await;
            (1, self.window)
        } else {
            (item.access_count() + 1, self.window - age)
        };

        if attempts > self.max_attempts {
            RateLimitDecision::Limited {
                retry_after: round_up_to_minutes(remaining),
            }
        } else {
            RateLimitDecision::Allowed
        }
    }

    /// Forget the attempts recorded for `name` (after a successful sign-in).
    pub async fn reset(&self, name: &str) {
        self.attempts.delete(name).await;
    }

    pub async fn purge_expired(&self) -> usize {
        self.attempts.purge_expired().await
    }
}

fn round_up_to_minutes(remaining: Duration) -> Duration {
    let seconds = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    Duration::from_secs(seconds.div_ceil(60).max(1) * 60)
}
