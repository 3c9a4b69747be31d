//! Bounded exponential backoff for request-level transient failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::sources::SourceError;

/// Jitter ceiling added to every backoff delay.
const MAX_JITTER: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the retry that follows failed attempt `attempt`
    /// (1-indexed): `base * 2^(attempt-1)` capped at `max_delay`, plus
    /// jitter.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        let capped = delay.min(self.max_delay);
        let jitter_cap = MAX_JITTER.min(capped).as_millis().max(1) as u64;
        let jitter = rand::thread_rng().gen_range(0..jitter_cap);
        capped + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(32))
    }
}

/// Run `op`, retrying transient source failures with exponential backoff
/// until the policy's attempt budget is spent. The final error is returned to
/// the caller, which counts it and moves on — a drained retry budget never
/// aborts a tier.
pub async fn with_retry<T, Fut>(
    policy: &RetryPolicy,
    mut op: impl FnMut() -> Fut,
) -> Result<T, SourceError>
where
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient source failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::sources::EnrichmentResult;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(2), Duration::from_millis(8))
    }

    #[tokio::test]
    async fn returns_first_success_without_retrying() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(EnrichmentResult::not_found()) }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_attempts_are_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<EnrichmentResult, _> = with_retry(&policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SourceError::unavailable("test", "503")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_when_a_later_attempt_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err(SourceError::unavailable("test", "timeout"))
                } else {
                    Ok(EnrichmentResult::not_found())
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn delays_grow_and_respect_the_cap() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(250));
        let d1 = policy.delay_for(1);
        let d3 = policy.delay_for(3);
        assert!(d1 >= Duration::from_millis(100));
        assert!(d3 >= Duration::from_millis(250));
        assert!(d3 <= Duration::from_millis(500));
    }
}
