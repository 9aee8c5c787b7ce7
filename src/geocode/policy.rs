//! Retry and pacing policy for the geocoding service
//!
//! [`RetryPolicy`] bounds how often a rate-limited lookup is retried.
//! [`Throttle`] is shared by every caller in the process: it caps in-flight
//! requests and spaces consecutive requests by a courtesy delay.

use std::time::Duration;
use tokio::sync::{AcquireError, Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;

/// Bounded retry for rate-limited lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Fixed wait before each retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Single attempt, never retry
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Whether another attempt is allowed after `attempt` (1-based) was rate limited
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Process-wide request pacing
#[derive(Debug)]
pub struct Throttle {
    permits: Semaphore,
    courtesy_delay: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(max_in_flight: usize, courtesy_delay: Duration) -> Self {
        Self {
            permits: Semaphore::new(max_in_flight.max(1)),
            courtesy_delay,
            next_slot: Mutex::new(None),
        }
    }

    /// No concurrency cap worth mentioning and no delay, for tests
    pub fn unlimited() -> Self {
        Self::new(Semaphore::MAX_PERMITS, Duration::ZERO)
    }

    pub fn courtesy_delay(&self) -> Duration {
        self.courtesy_delay
    }

    /// Wait for an in-flight slot and for this request's turn
    ///
    /// Turns are handed out `courtesy_delay` apart in acquisition order. The
    /// returned permit holds the in-flight slot until dropped. Fails only once
    /// the throttle has been closed.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, AcquireError> {
        let permit = self.permits.acquire().await?;

        let wait_until = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next_slot = Some(slot + self.courtesy_delay);
            slot
        };

        tokio::time::sleep_until(wait_until).await;
        Ok(permit)
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(850))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_default_retry_is_one_extra_attempt() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
        assert_eq!(policy.backoff, Duration::from_millis(1500));
    }

    #[test]
    fn test_no_retry() {
        let policy = RetryPolicy::no_retry();
        assert!(!policy.should_retry(1));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_throttle_spaces_requests() {
        let throttle = Throttle::new(4, Duration::from_millis(40));
        let start = Instant::now();
        for _ in 0..3 {
            let _permit = throttle.acquire().await.unwrap();
        }
        // First request goes immediately, the next two wait one delay each
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_throttle_caps_in_flight() {
        let throttle = Arc::new(Throttle::new(1, Duration::ZERO));
        let held = throttle.acquire().await.unwrap();
        assert_eq!(throttle.permits.available_permits(), 0);

        let waiter = {
            let throttle = throttle.clone();
            tokio::spawn(async move {
                let _permit = throttle.acquire().await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_throttle_refuses_without_panicking() {
        let throttle = Throttle::new(1, Duration::ZERO);
        throttle.permits.close();
        assert!(throttle.acquire().await.is_err());
    }
}
