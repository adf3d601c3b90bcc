//! Backoff and rate-limit policy for GitHub requests.
//!
//! Transient failures get three attempts with exponential backoff. An
//! exhausted quota (HTTP 403 with `x-ratelimit-remaining: 0`) is not a
//! failure: the caller waits for the reported reset and repeats the same
//! request, up to [`MAX_RATE_LIMIT_WAITS`] times per request.

use backon::ExponentialBuilder;
use std::collections::BTreeMap;
use std::time::Duration;

pub const MAX_ATTEMPTS: usize = 3;
pub const MIN_BACKOFF: Duration = Duration::from_secs(4);
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);
pub const MAX_RATE_LIMIT_WAITS: usize = 5;
pub const RATE_LIMIT_MARGIN_SECS: u64 = 1;

/// Exponential backoff for transient failures: 4s, 8s, capped at 10s.
pub fn retry_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_factor(2.0)
        .with_min_delay(MIN_BACKOFF)
        .with_max_delay(MAX_BACKOFF)
        // retries after the first attempt
        .with_max_times(MAX_ATTEMPTS - 1)
}

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitState {
    pub remaining: Option<u64>,
    pub reset_epoch_secs: Option<u64>,
}

impl RateLimitState {
    /// Header names are expected in lowercase.
    pub fn from_headers(headers: &BTreeMap<String, String>) -> Self {
        let parse = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.trim().parse::<u64>().ok())
        };
        Self {
            remaining: parse("x-ratelimit-remaining"),
            reset_epoch_secs: parse("x-ratelimit-reset"),
        }
    }

    /// How long to wait before repeating a request, if the quota is exhausted.
    pub fn exhausted_wait(&self, now_epoch_secs: u64) -> Option<Duration> {
        if self.remaining != Some(0) {
            return None;
        }
        let reset = self.reset_epoch_secs?;
        let secs = reset.saturating_sub(now_epoch_secs) + RATE_LIMIT_MARGIN_SECS;
        Some(Duration::from_secs(secs))
    }
}
