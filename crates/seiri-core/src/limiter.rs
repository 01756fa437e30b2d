use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use tokio::sync::Mutex;

use crate::config::LimiterConfig;

type Bucket = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared token gate for every outbound catalog and episode call.
///
/// Waiters queue on a FIFO-fair async mutex and take tokens in arrival
/// order; nobody is dropped or reordered. Construct one per process and
/// share it as `Arc<RateLimiter>`.
pub struct RateLimiter {
    bucket: Bucket,
    queue: Mutex<()>,
    acquired: AtomicU64,
}

impl RateLimiter {
    /// Zero values are clamped to one.
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        Self {
            bucket: Bucket::direct(Quota::per_minute(rate).allow_burst(burst)),
            queue: Mutex::new(()),
            acquired: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &LimiterConfig) -> Self {
        Self::new(config.requests_per_minute, config.burst)
    }

    /// Wait for a token.
    pub async fn acquire(&self) {
        let _turn = self.queue.lock().await;
        self.bucket.until_ready().await;
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    /// Total tokens handed out so far.
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("acquired", &self.acquired())
            .finish_non_exhaustive()
    }
}
