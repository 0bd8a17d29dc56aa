use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::PlanTier;

const WINDOW_SECS: i64 = 60;

struct WindowEntry {
    window_start: i64,
    count: u32,
}

impl WindowEntry {
    /// Counts a request against the current fixed window, rolling the
    /// window over when it has expired. Returns false once the limit is hit.
    fn increment_if_valid(&mut self, now: i64, limit: u32) -> bool {
        if now - self.window_start >= WINDOW_SECS {
            self.window_start = now;
            self.count = 0;
        }
        if self.count < limit {
            self.count += 1;
            true
        } else {
            false
        }
    }
}

/// Per-subscriber request throttle with per-tier ceilings.
///
/// Fixed one-minute windows in a DashMap. Single-instance by design; the
/// credit ledger is the cross-instance source of truth, this only smooths
/// bursts.
pub struct RateLimiter {
    windows: DashMap<Uuid, WindowEntry>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    pub fn check(&self, id: Uuid, tier: PlanTier) -> Result<(), ApiError> {
        let Some(limit) = tier.requests_per_minute() else {
            return Ok(());
        };
        let now = Utc::now().timestamp();
        let mut entry = self.windows.entry(id).or_insert(WindowEntry {
            window_start: now,
            count: 0,
        });
        if entry.increment_if_valid(now, limit) {
            Ok(())
        } else {
            Err(ApiError::TooManyRequests(format!(
                "limit of {} requests per minute reached for the {} tier",
                limit, tier
            )))
        }
    }

    /// Drops windows idle for more than two periods.
    pub fn purge_stale(&self) {
        let cutoff = Utc::now().timestamp() - 2 * WINDOW_SECS;
        self.windows.retain(|_, entry| entry.window_start >= cutoff);
    }

    /// Periodic sweep so the window table does not grow with every
    /// subscriber ever seen.
    pub fn start_cleanup_task(self: &Arc<Self>) {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.purge_stale();
            }
        });
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
