//! Rate Limiting Service
//!
//! Fixed-window request limiting keyed by client address. Counters live in
//! process memory; a background task drops windows that have elapsed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Rate limiting specific errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("Rate limit exceeded for {identifier}: {attempts} requests in window")]
    RateLimitExceeded {
        identifier: String,
        attempts: u32,
        retry_after: u64,
    },
}

/// Result type for rate limiting operations
pub type RateLimitResult<T> = Result<T, RateLimitError>;

/// Maximum number of requests allowed per window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimit {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

impl Window {
    fn is_expired(&self, now: Instant, length: Duration) -> bool {
        now.saturating_duration_since(self.started) >= length
    }
}

/// In-memory fixed-window rate limiter shared by all request tasks
#[derive(Debug)]
pub struct RateLimitService {
    limit: RateLimit,
    windows: DashMap<String, Window>,
}

impl RateLimitService {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            windows: DashMap::new(),
        }
    }

    /// Count one request for `identifier` and reject it if the window is full.
    pub fn check(&self, identifier: &str) -> RateLimitResult<()> {
        self.check_at(identifier, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&self, identifier: &str, now: Instant) -> RateLimitResult<()> {
        let mut entry = self
            .windows
            .entry(identifier.to_string())
            .or_insert(Window {
                started: now,
                count: 0,
            });

        if entry.is_expired(now, self.limit.window) {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.limit.max_requests {
            let elapsed = now.saturating_duration_since(entry.started);
            let remaining = self.limit.window.saturating_sub(elapsed);
            let retry_after = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);

            return Err(RateLimitError::RateLimitExceeded {
                identifier: identifier.to_string(),
                attempts: entry.count,
                retry_after: retry_after.max(1),
            });
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop every window that has elapsed, returning how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let window = self.limit.window;
        self.windows.retain(|_, w| !w.is_expired(now, window));
        before.saturating_sub(self.windows.len())
    }

    /// Number of tracked clients
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    /// Periodically purge elapsed windows until the task is aborted.
    pub fn spawn_purge_task(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = self.purge_expired(Instant::now());
                if removed > 0 {
                    log::debug!("Purged {} expired rate-limit windows", removed);
                }
            }
        })
    }
}
