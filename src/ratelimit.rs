//! Per-source request spacing.
//!
//! Each external source gets its own independent limiter keyed by source id;
//! there is no global cap. `acquire` only ever delays, it cannot fail, and
//! the first acquisition for a source is immediate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Spacing applied to sources nobody registered an interval for.
const FALLBACK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct RateLimiter {
    intervals: HashMap<String, Duration>,
    // Arc lets the DashMap shard lock drop before awaiting on the inner
    // mutex, so one source's wait never blocks another source's acquire.
    last_granted: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            intervals: HashMap::new(),
            last_granted: DashMap::new(),
        }
    }

    /// Register a source's requests-per-second ceiling. A ceiling of `rps`
    /// becomes a minimum spacing of `1/rps` seconds between granted
    /// acquisitions.
    pub fn register(&mut self, source: &str, requests_per_second: f64) {
        let interval = Duration::from_secs_f64(1.0 / requests_per_second);
        self.intervals.insert(source.to_string(), interval);
    }

    fn interval_for(&self, source: &str) -> Duration {
        self.intervals
            .get(source)
            .copied()
            .unwrap_or(FALLBACK_INTERVAL)
    }

    /// Wait until at least the configured interval has elapsed since the
    /// previous granted acquisition for `source`, then record the grant.
    pub async fn acquire(&self, source: &str) {
        let interval = self.interval_for(source);
        let state = self
            .last_granted
            .entry(source.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        // Holding the mutex across the sleep serializes dispatch for this
        // source even with concurrent callers.
        let mut last = state.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                let wait = interval - elapsed;
                debug!(source, wait_ms = wait.as_millis() as u64, "rate limit wait");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
