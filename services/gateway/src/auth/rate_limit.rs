//! Per-user fixed-window rate limiting.
//!
//! Windows are tracked behind an injected [`RateStore`] so a keyed
//! external cache can replace the in-memory map in a multi-instance
//! deployment. Windows expire passively: there is no timer, a stale
//! window is simply replaced on the next request past its boundary.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use errors::{EntregaError, EntregaResult};

/// Route classes get separate budgets (admin surfaces are tighter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    General,
    Sensitive,
}

impl RouteClass {
    fn as_str(&self) -> &'static str {
        match self {
            RouteClass::General => "general",
            RouteClass::Sensitive => "sensitive",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Keyed counter store with per-key atomic window accounting.
pub trait RateStore: Send + Sync {
    /// Increment the counter for `key`, opening a fresh window expiring
    /// at `now_ms + window_ms` if the active one has elapsed. Returns
    /// the count after the increment and the active window's reset
    /// time. The reset must be a single atomic check-and-set per key so
    /// that requests racing the window boundary cannot double-reset.
    fn increment_with_ttl(&self, key: &str, window_ms: i64, now_ms: i64) -> (u32, i64);
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    reset_at_ms: i64,
}

/// In-memory `RateStore`. The DashMap entry guard is the per-key
/// critical section.
#[derive(Default)]
pub struct MemoryRateStore {
    windows: DashMap<String, RateWindow>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateStore for MemoryRateStore {
    fn increment_with_ttl(&self, key: &str, window_ms: i64, now_ms: i64) -> (u32, i64) {
        let mut entry = self.windows.entry(key.to_string()).or_insert(RateWindow {
            count: 0,
            reset_at_ms: now_ms + window_ms,
        });
        if now_ms > entry.reset_at_ms {
            entry.count = 1;
            entry.reset_at_ms = now_ms + window_ms;
        } else {
            entry.count = entry.count.saturating_add(1);
        }
        (entry.count, entry.reset_at_ms)
    }
}

pub struct RateLimiter {
    store: Arc<dyn RateStore>,
    general: RateLimitConfig,
    sensitive: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateStore>, general: RateLimitConfig, sensitive: RateLimitConfig) -> Self {
        Self {
            store,
            general,
            sensitive,
        }
    }

    fn config(&self, class: RouteClass) -> RateLimitConfig {
        match class {
            RouteClass::General => self.general,
            RouteClass::Sensitive => self.sensitive,
        }
    }

    /// Account one request for `user_id` against the class budget.
    pub fn check(&self, user_id: Uuid, class: RouteClass) -> EntregaResult<()> {
        self.check_at(user_id, class, Utc::now().timestamp_millis())
    }

    /// Clock-injected variant of [`check`](Self::check), used by tests.
    pub fn check_at(&self, user_id: Uuid, class: RouteClass, now_ms: i64) -> EntregaResult<()> {
        let cfg = self.config(class);
        let key = format!("{}:{}", class.as_str(), user_id);
        let window_ms = (cfg.window_secs * 1000) as i64;
        let (count, reset_at_ms) = self.store.increment_with_ttl(&key, window_ms, now_ms);

        if count > cfg.max_requests {
            let retry_after_secs = (((reset_at_ms - now_ms).max(0) + 999) / 1000) as u64;
            return Err(EntregaError::RateLimited { retry_after_secs });
        }
        Ok(())
    }
}
