//! Tri-state health signal derived from feed state.
//!
//! The report is computed on every call from the registry and the run flag;
//! nothing here is cached. Precedence, highest first:
//! - `error`: the run flag is cleared, or a worker has been dead for longer
//!   than one supervisor poll interval.
//! - `warning`: a worker is dead but the supervisor has not had a poll to
//!   replace it yet, or no snapshot has been accepted within `stale_after`.
//! - `healthy`: otherwise.
//!
//! Freshness is measured from the newest acceptance time across feeds. Until
//! the first promotion the process start time stands in for it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Feed;
use crate::registry::FeedRegistry;
use crate::run_flag::RunFlag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Error,
}

/// Thresholds the report is judged against.
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub stale_after: Duration,
    pub poll_interval: Duration,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_update: Option<String>,
    pub water_data_available: bool,
    pub rainfall_data_available: bool,
    pub water_worker_alive: bool,
    pub rainfall_worker_alive: bool,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_error(&self) -> bool {
        self.status == HealthStatus::Error
    }
}

/// Compute the current health of the pipeline.
pub fn evaluate(
    registry: &FeedRegistry,
    run_flag: &RunFlag,
    now: DateTime<Utc>,
    thresholds: HealthThresholds,
) -> HealthReport {
    // ---
    let available = |feed| registry.latest(feed).is_some();
    let alive = |feed| registry.liveness(feed).alive;

    let last_update = Feed::ALL
        .iter()
        .filter_map(|&feed| registry.latest(feed))
        .max_by_key(|entry| entry.accepted_at)
        .map(|entry| entry.snapshot.last_updated());

    let (status, message) = judge(registry, run_flag, now, thresholds);

    HealthReport {
        status,
        message,
        last_update,
        water_data_available: available(Feed::WaterLevel),
        rainfall_data_available: available(Feed::Rainfall),
        water_worker_alive: alive(Feed::WaterLevel),
        rainfall_worker_alive: alive(Feed::Rainfall),
        timestamp: now,
    }
}

fn judge(
    registry: &FeedRegistry,
    run_flag: &RunFlag,
    now: DateTime<Utc>,
    thresholds: HealthThresholds,
) -> (HealthStatus, Option<String>) {
    // ---
    if !run_flag.is_running() {
        return (HealthStatus::Error, Some("Scraping is not active".to_string()));
    }

    let mut recently_dead = None;
    for feed in Feed::ALL {
        let live = registry.liveness(feed);
        if live.alive {
            continue;
        }
        let dead_for = live
            .died_at
            .map(|at| elapsed(now, at))
            .unwrap_or(Duration::MAX);
        if dead_for > thresholds.poll_interval {
            return (
                HealthStatus::Error,
                Some(format!("{} worker is not running", feed.label())),
            );
        }
        recently_dead.get_or_insert(feed);
    }
    if let Some(feed) = recently_dead {
        return (
            HealthStatus::Warning,
            Some(format!("{} worker is restarting", feed.label())),
        );
    }

    let reference = registry
        .last_accepted_at()
        .unwrap_or_else(|| registry.process_started_at());
    let age = elapsed(now, reference);
    if age > thresholds.stale_after {
        return (
            HealthStatus::Warning,
            Some(format!("No data updates in {} minutes", age.as_secs() / 60)),
        );
    }

    (HealthStatus::Healthy, None)
}

fn elapsed(now: DateTime<Utc>, since: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}
