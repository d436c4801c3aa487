use crate::config::RateLimitConfig;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: i64,
}

/// Fixed-window request counter keyed by client IP.
///
/// A window expires only once `now - window_start` is strictly greater than
/// the window length; a request landing exactly on the boundary still counts
/// against the old window.
///
/// Once the table holds `max_entries` keys, a new key triggers a sweep of
/// expired entries, at most once per window.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    window_ms: i64,
    max_requests: u32,
    max_entries: usize,
    table: Mutex<Table>,
}

#[derive(Debug, Default)]
struct Table {
    entries: HashMap<String, RateLimitEntry>,
    last_sweep: Option<i64>,
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimitConfig, max_entries: usize) -> Self {
        Self {
            window_ms: config.window_millis(),
            max_requests: config.max_requests,
            max_entries,
            table: Mutex::new(Table::default()),
        }
    }

    pub async fn check(&self, key: &str) -> bool {
        self.check_at(key, Utc::now().timestamp_millis()).await
    }

    pub async fn check_at(&self, key: &str, now_ms: i64) -> bool {
        let mut table = self.table.lock().await;
        let window_ms = self.window_ms;

        let sweep_due = table
            .last_sweep
            .map_or(true, |last| now_ms - last > window_ms);
        let is_full =
            table.entries.len() >= self.max_entries && !table.entries.contains_key(key);
        if sweep_due && is_full {
            let before = table.entries.len();
            table
                .entries
                .retain(|_, e| now_ms - e.window_start <= window_ms);
            table.last_sweep = Some(now_ms);
            debug!(
                "Swept {} expired rate limit entries",
                before - table.entries.len()
            );
        }

        let entry = table
            .entries
            .entry(key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_start: now_ms,
            });

        if now_ms - entry.window_start > window_ms {
            entry.count = 1;
            entry.window_start = now_ms;
            return true;
        }
        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }

    pub async fn entry(&self, key: &str) -> Option<RateLimitEntry> {
        self.table.lock().await.entries.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.entries.len()
    }
}
