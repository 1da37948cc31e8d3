//! Per-address rate limiting for the query interface.
//!
//! Each caller address owns two rolling windows, one minute and one hour.
//! A window starts at the first request after the previous one expired, so
//! the boundaries are relative to the caller's traffic, not the wall clock.
//!
//! A request is admitted only if both windows have room; a request rejected
//! by the minute window is not counted against the hour window.
//!
//! Entries whose hour window has expired are pruned every
//! `cleanup_interval` requests so the map stays bounded by active callers.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Configuration for the rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per address in one minute window.
    pub per_minute: u32,

    /// Requests allowed per address in one hour window.
    pub per_hour: u32,

    /// Prune expired entries every N requests.
    pub cleanup_interval: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 100,
            per_hour: 1000,
            cleanup_interval: 100,
        }
    }
}

/// Which window rejected the request. The display text is the client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateLimitExceeded {
    #[error("Rate limit exceeded. Please try again later.")]
    Minute,

    #[error("Hourly rate limit exceeded. Please try again later.")]
    Hour,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    count: u32,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self { start: now, count: 0 }
    }

    fn expired(&self, now: Instant, length: Duration) -> bool {
        now.saturating_duration_since(self.start) > length
    }
}

/// The two rolling counters of one caller.
#[derive(Debug, Clone, Copy)]
struct ClientRateWindow {
    minute: Window,
    hour: Window,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: Mutex<HashMap<IpAddr, ClientRateWindow>>,
    request_count: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
            request_count: AtomicU64::new(0),
        }
    }

    /// Admit or reject one request from `ip` at `now`.
    pub fn check(&self, ip: IpAddr, now: Instant) -> Result<(), RateLimitExceeded> {
        // ---
        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if count > 0 && count % self.config.cleanup_interval.max(1) == 0 {
            self.cleanup(now);
        }

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let client = clients.entry(ip).or_insert_with(|| ClientRateWindow {
            minute: Window::new(now),
            hour: Window::new(now),
        });

        if client.minute.expired(now, MINUTE) {
            client.minute = Window::new(now);
        } else if client.minute.count >= self.config.per_minute {
            tracing::warn!(ip = %ip, requests = client.minute.count, "Minute rate limit exceeded");
            return Err(RateLimitExceeded::Minute);
        }

        if client.hour.expired(now, HOUR) {
            client.hour = Window::new(now);
        } else if client.hour.count >= self.config.per_hour {
            tracing::warn!(ip = %ip, requests = client.hour.count, "Hourly rate limit exceeded");
            return Err(RateLimitExceeded::Hour);
        }

        client.minute.count += 1;
        client.hour.count += 1;
        Ok(())
    }

    /// Drop callers whose hour window has expired.
    pub fn cleanup(&self, now: Instant) {
        // ---
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let before = clients.len();
        clients.retain(|_, client| !client.hour.expired(now, HOUR));
        tracing::debug!(
            removed = before - clients.len(),
            tracked = clients.len(),
            "Rate limiter cleanup"
        );
    }

    /// Number of caller addresses currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
