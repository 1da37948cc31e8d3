//! Per-feed acquisition loop.
//!
//! Each iteration: acquire (bounded retry, per-attempt timeout) → fingerprint
//! → promote on change (registry first, then write-through to the store) →
//! sleep. A successful iteration, changed or not, sleeps until one full tick
//! has elapsed since it started so the cadence stays on a fixed grid. A
//! failed iteration sleeps the linear failure backoff instead.
//!
//! Nothing in here is fatal: acquisition errors turn into backoff and
//! persistence errors are logged without undoing the in-memory promotion.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::PipelineSettings;
use crate::error::AcquisitionError;
use crate::fingerprint::{fingerprint, has_changed};
use crate::models::{Feed, Snapshot};
use crate::registry::{FeedRegistry, LivenessGuard};
use crate::retry::{failure_backoff, with_retry};
use crate::run_flag::RunFlag;
use crate::source::SnapshotSource;
use crate::store::SnapshotStore;

/// Result of one pass through the loop body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// A changed snapshot was accepted.
    Promoted,
    /// The snapshot matched the last accepted one; nothing was written.
    Unchanged,
    /// Every attempt failed or yielded an empty table.
    Failed { consecutive_failures: u32 },
}

pub struct FeedWorker {
    feed: Feed,
    registry: Arc<FeedRegistry>,
    source: Arc<dyn SnapshotSource>,
    store: Arc<dyn SnapshotStore>,
    settings: PipelineSettings,
    run_flag: RunFlag,
    consecutive_failures: u32,
}

impl FeedWorker {
    pub fn new(
        feed: Feed,
        registry: Arc<FeedRegistry>,
        source: Arc<dyn SnapshotSource>,
        store: Arc<dyn SnapshotStore>,
        settings: PipelineSettings,
        run_flag: RunFlag,
    ) -> Self {
        Self {
            feed,
            registry,
            source,
            store,
            settings,
            run_flag,
            consecutive_failures: 0,
        }
    }

    /// Run until the run flag is cleared.
    pub async fn run(mut self) {
        // ---
        let _liveness = LivenessGuard::new(Arc::clone(&self.registry), self.feed);
        info!(feed = %self.feed, source = self.source.name(), "Feed worker started");

        while self.run_flag.is_running() {
            let started = Instant::now();

            let pause = match self.run_iteration().await {
                IterationOutcome::Failed {
                    consecutive_failures,
                } => {
                    let backoff = failure_backoff(consecutive_failures);
                    warn!(
                        feed = %self.feed,
                        consecutive_failures,
                        "Backing off for {:?}", backoff
                    );
                    backoff
                }
                IterationOutcome::Promoted | IterationOutcome::Unchanged => {
                    self.settings.scrape_interval.saturating_sub(started.elapsed())
                }
            };

            if !self.run_flag.sleep(pause).await {
                break;
            }
        }

        info!(feed = %self.feed, "Feed worker stopped");
    }

    /// One acquire → detect → promote pass, without the trailing sleep.
    pub async fn run_iteration(&mut self) -> IterationOutcome {
        // ---
        match self.acquire().await {
            Ok(snapshot) => {
                self.record_failures(0);
                self.evaluate(snapshot).await
            }
            Err(e) => {
                self.record_failures(self.consecutive_failures.saturating_add(1));
                error!(
                    feed = %self.feed,
                    consecutive_failures = self.consecutive_failures,
                    error = %e,
                    "Acquisition failed"
                );
                IterationOutcome::Failed {
                    consecutive_failures: self.consecutive_failures,
                }
            }
        }
    }

    fn record_failures(&mut self, failures: u32) {
        self.consecutive_failures = failures;
        self.registry.set_consecutive_failures(self.feed, failures);
    }

    async fn acquire(&self) -> Result<Snapshot, AcquisitionError> {
        // ---
        let feed = self.feed;
        let source = &self.source;
        let timeout = self.settings.fetch_timeout;

        with_retry(
            |attempt| async move {
                debug!(feed = %feed, attempt, "Acquiring snapshot");
                let snapshot = tokio::time::timeout(timeout, source.fetch(feed))
                    .await
                    .map_err(|_| AcquisitionError::Timeout(timeout))??;

                // A live page with an empty table is a scrape defect, not "no data".
                if snapshot.is_empty() {
                    return Err(AcquisitionError::Empty { feed });
                }
                Ok::<Snapshot, AcquisitionError>(snapshot)
            },
            self.settings.fetch_max_attempts,
            self.settings.fetch_retry_delay,
            &self.run_flag,
        )
        .await
    }

    async fn evaluate(&self, snapshot: Snapshot) -> IterationOutcome {
        // ---
        let candidate = fingerprint(&snapshot);
        let last = self.registry.last_fingerprint(self.feed);
        if !has_changed(last.as_ref(), &candidate) {
            info!(feed = %self.feed, fingerprint = %candidate, "No changes in data");
            return IterationOutcome::Unchanged;
        }

        let snapshot = Arc::new(snapshot);
        self.registry
            .promote(self.feed, Arc::clone(&snapshot), candidate.clone(), Utc::now());
        info!(
            feed = %self.feed,
            fingerprint = %candidate,
            readings = snapshot.readings.len(),
            captured_at = %snapshot.last_updated(),
            "Data updated"
        );

        self.persist(&snapshot).await;
        IterationOutcome::Promoted
    }

    /// Write-through of an accepted snapshot. Failures are logged only; the
    /// next promotion overwrites the same documents.
    async fn persist(&self, snapshot: &Snapshot) {
        // ---
        let feed = self.feed;
        let date = snapshot.date_key();

        if let Err(e) = self.store.put_latest(feed, snapshot).await {
            error!(feed = %feed, error = %e, "Failed to save latest snapshot");
        }

        if let Err(e) = self.store.put_dated(feed, &date, snapshot).await {
            error!(feed = %feed, date = %date, error = %e, "Failed to save dated snapshot");
            return;
        }

        if let Err(e) = self.store.add_date(feed, &date).await {
            error!(feed = %feed, date = %date, error = %e, "Failed to update date index");
            return;
        }

        info!(feed = %feed, date = %date, "Snapshot persisted");
    }
}
