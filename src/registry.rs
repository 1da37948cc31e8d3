//! Explicit owned state of every feed.
//!
//! One [`FeedRegistry`] is built at startup and shared (behind `Arc`) by the
//! supervisor, the feed workers, the health reporter and the query gateway.
//! It holds:
//! - the per-feed [`FeedState`] (last accepted snapshot, its fingerprint and
//!   acceptance time, the current failure streak). The snapshot slot is the
//!   latest-state cache read by the query path.
//! - the per-feed [`WorkerLiveness`] record maintained by the running worker
//!   and the supervisor.
//!
//! Snapshots are stored as `Arc<Snapshot>` and replaced whole under the write
//! lock, so a reader sees either the previous or the new snapshot, never a
//! mix. Only the feed's own worker calls the mutating methods.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::fingerprint::Fingerprint;
use crate::models::{Feed, Snapshot};

/// Accepted state of one feed.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    pub snapshot: Option<Arc<Snapshot>>,
    pub fingerprint: Option<Fingerprint>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

/// Liveness record of one feed's worker task.
#[derive(Debug, Clone, Default)]
pub struct WorkerLiveness {
    pub alive: bool,
    /// How many times a worker has been started for this feed.
    pub starts: u32,
    pub died_at: Option<DateTime<Utc>>,
}

/// What the query gateway serves for `latest`.
#[derive(Debug, Clone)]
pub struct LatestEntry {
    pub snapshot: Arc<Snapshot>,
    pub accepted_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct FeedSlot {
    state: RwLock<FeedState>,
    liveness: RwLock<WorkerLiveness>,
}

#[derive(Debug)]
pub struct FeedRegistry {
    started_at: DateTime<Utc>,
    water_level: FeedSlot,
    rainfall: FeedSlot,
}

impl Default for FeedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedRegistry {
    /// Empty state for every feed, started now.
    pub fn new() -> Self {
        Self::started_at(Utc::now())
    }

    pub fn started_at(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            water_level: FeedSlot::default(),
            rainfall: FeedSlot::default(),
        }
    }

    pub fn process_started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn slot(&self, feed: Feed) -> &FeedSlot {
        // ---
        match feed {
            Feed::WaterLevel => &self.water_level,
            Feed::Rainfall => &self.rainfall,
        }
    }

    // --- feed state

    /// Copy of the feed's state; snapshots are shared, not cloned.
    pub fn state(&self, feed: Feed) -> FeedState {
        self.slot(feed)
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recently accepted snapshot, if any.
    pub fn latest(&self, feed: Feed) -> Option<LatestEntry> {
        // ---
        let state = self.slot(feed).state.read().unwrap_or_else(PoisonError::into_inner);
        match (&state.snapshot, state.accepted_at) {
            (Some(snapshot), Some(accepted_at)) => Some(LatestEntry {
                snapshot: Arc::clone(snapshot),
                accepted_at,
            }),
            _ => None,
        }
    }

    pub fn last_fingerprint(&self, feed: Feed) -> Option<Fingerprint> {
        self.slot(feed)
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .fingerprint
            .clone()
    }

    /// Accept `snapshot` as the feed's current state and clear its failure streak.
    pub fn promote(
        &self,
        feed: Feed,
        snapshot: Arc<Snapshot>,
        fingerprint: Fingerprint,
        accepted_at: DateTime<Utc>,
    ) {
        // ---
        let mut state = self.slot(feed).state.write().unwrap_or_else(PoisonError::into_inner);
        *state = FeedState {
            snapshot: Some(snapshot),
            fingerprint: Some(fingerprint),
            accepted_at: Some(accepted_at),
            consecutive_failures: 0,
        };
    }

    pub fn set_consecutive_failures(&self, feed: Feed, failures: u32) {
        self.slot(feed)
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .consecutive_failures = failures;
    }

    /// Latest acceptance time across all feeds.
    pub fn last_accepted_at(&self) -> Option<DateTime<Utc>> {
        Feed::ALL
            .iter()
            .filter_map(|&feed| self.state(feed).accepted_at)
            .max()
    }

    // --- worker liveness

    pub fn liveness(&self, feed: Feed) -> WorkerLiveness {
        self.slot(feed)
            .liveness
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record that a worker for `feed` has started. Its failure streak starts over.
    pub fn worker_started(&self, feed: Feed) {
        // ---
        {
            let mut live = self.slot(feed).liveness.write().unwrap_or_else(PoisonError::into_inner);
            live.alive = true;
            live.starts += 1;
            live.died_at = None;
        }
        self.set_consecutive_failures(feed, 0);
    }

    /// Record that the worker for `feed` has ended. Keeps the first death time
    /// if called more than once.
    pub fn worker_stopped(&self, feed: Feed, now: DateTime<Utc>) {
        // ---
        let mut live = self.slot(feed).liveness.write().unwrap_or_else(PoisonError::into_inner);
        if live.alive || live.died_at.is_none() {
            live.died_at = Some(now);
        }
        live.alive = false;
    }
}

/// Marks the worker alive while held and dead when dropped, including when
/// the worker task unwinds from a panic.
#[derive(Debug)]
pub struct LivenessGuard {
    registry: Arc<FeedRegistry>,
    feed: Feed,
}

impl LivenessGuard {
    pub fn new(registry: Arc<FeedRegistry>, feed: Feed) -> Self {
        registry.worker_started(feed);
        Self { registry, feed }
    }
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.registry.worker_stopped(self.feed, Utc::now());
    }
}
