// Request pacing for NCBI E-utilities.
//
// NCBI allows 3 requests per second without an API key and 10 with one.
// Each caller reserves the next free slot under the lock, then sleeps
// outside it, so concurrent callers queue in order without blocking
// each other on the mutex.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Requests per second NCBI allows without an API key.
pub const NCBI_ANONYMOUS_RPS: f64 = 3.0;

/// Requests per second NCBI allows with an API key.
pub const NCBI_KEYED_RPS: f64 = 10.0;

/// Spaces requests at least `interval` apart.
#[derive(Clone)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// A limiter allowing `requests_per_second` requests per second.
    pub fn new(requests_per_second: f64) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / requests_per_second),
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// The limit NCBI applies, depending on whether an API key is sent.
    pub fn for_ncbi(has_api_key: bool) -> Self {
        Self::new(if has_api_key {
            NCBI_KEYED_RPS
        } else {
            NCBI_ANONYMOUS_RPS
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for this caller's slot.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + self.interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_request_is_immediate() {
        let limiter = RateLimiter::new(3.0);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn second_request_waits_for_interval() {
        let limiter = RateLimiter::new(4.0); // 250ms apart
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(200),
            "Expected ~250ms delay, got {:?}",
            elapsed
        );
    }

    #[test]
    fn ncbi_limits_depend_on_key() {
        assert_eq!(
            RateLimiter::for_ncbi(false).interval(),
            Duration::from_secs_f64(1.0 / 3.0)
        );
        assert_eq!(
            RateLimiter::for_ncbi(true).interval(),
            Duration::from_millis(100)
        );
    }
}
