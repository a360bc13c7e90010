//! Fixed-window rate limiting
//!
//! Each `"{caller}:{action}"` key gets `max_requests` slots per window.
//! A window opens on the first request for a key and resets once it has
//! fully elapsed.

use crate::config::RateLimitConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Rate limiter result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request allowed
    Allowed {
        /// Slots left in this window
        remaining: u32,
    },

    /// Request denied (window exhausted)
    Denied {
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl RateLimitResult {
    /// True when a slot was granted
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

#[derive(Debug)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

impl WindowEntry {
    fn expired(&self, window: Duration, now: Instant) -> bool {
        now.duration_since(self.window_start) >= window
    }
}

/// Per-key fixed-window limiter
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    entries: Arc<RwLock<HashMap<String, WindowEntry>>>,
}

impl RateLimiter {
    /// Limiter with the configured window and quota
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Limiter key for `caller` performing `action`
    pub fn key(caller: &str, action: &str) -> String {
        format!("{}:{}", caller, action)
    }

    /// Consume a slot for `caller` performing `action`
    pub async fn check(&self, caller: &str, action: &str) -> RateLimitResult {
        let key = Self::key(caller, action);
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let entry = entries.entry(key).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });
        if entry.expired(self.window, now) {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.max_requests {
            let retry_after = (entry.window_start + self.window).saturating_duration_since(now);
            warn!(caller, action, ?retry_after, "Rate limit exceeded");
            return RateLimitResult::Denied { retry_after };
        }

        entry.count += 1;
        let remaining = self.max_requests - entry.count;
        debug!(caller, action, remaining, "Rate limit check passed");
        RateLimitResult::Allowed { remaining }
    }

    /// Slots left in the current window, without consuming one
    pub async fn remaining(&self, caller: &str, action: &str) -> u32 {
        let entries = self.entries.read().await;
        match entries.get(&Self::key(caller, action)) {
            Some(entry) if !entry.expired(self.window, Instant::now()) => {
                self.max_requests.saturating_sub(entry.count)
            }
            _ => self.max_requests,
        }
    }

    /// When the current window for the key closes, if one is open
    pub async fn reset_at(&self, caller: &str, action: &str) -> Option<Instant> {
        let entries = self.entries.read().await;
        entries
            .get(&Self::key(caller, action))
            .filter(|entry| !entry.expired(self.window, Instant::now()))
            .map(|entry| entry.window_start + self.window)
    }

    /// Drop keys whose window has elapsed. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.expired(self.window, now));
        let removed = before - entries.len();

        if removed > 0 {
            info!(removed, tracked = entries.len(), "Rate limiter cleanup");
        }
        removed
    }

    /// Keys currently tracked
    pub async fn tracked_keys(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Start cleanup task. Periods under 1 ms are raised to 1 ms.
    pub fn start_cleanup_task(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let period = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                self.cleanup().await;
            }
        })
    }
}
