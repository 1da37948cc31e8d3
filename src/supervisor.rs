//! Self-healing supervision of the feed workers.
//!
//! The supervisor owns one `JoinHandle` per feed. Every poll interval it
//! checks which handles have completed; a completed worker (returned early
//! or panicked) is logged and replaced with a fresh one. Feed state lives in
//! the registry, not the worker, so the replacement resumes with the last
//! accepted fingerprint and snapshot and only loses its failure streak.
//!
//! The supervisor exits only when the run flag is cleared, after waiting for
//! the workers to wind down.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::PipelineSettings;
use crate::models::Feed;
use crate::registry::FeedRegistry;
use crate::run_flag::RunFlag;
use crate::source::SnapshotSource;
use crate::store::SnapshotStore;
use crate::worker::FeedWorker;

/// Starts the task that acquires one feed.
pub trait WorkerSpawner: Send + Sync {
    fn spawn(&self, feed: Feed) -> JoinHandle<()>;
}

/// Production spawner: a [`FeedWorker`] per call.
pub struct FeedWorkerSpawner {
    pub registry: Arc<FeedRegistry>,
    pub source: Arc<dyn SnapshotSource>,
    pub store: Arc<dyn SnapshotStore>,
    pub settings: PipelineSettings,
    pub run_flag: RunFlag,
}

impl WorkerSpawner for FeedWorkerSpawner {
    fn spawn(&self, feed: Feed) -> JoinHandle<()> {
        // ---
        let worker = FeedWorker::new(
            feed,
            Arc::clone(&self.registry),
            Arc::clone(&self.source),
            Arc::clone(&self.store),
            self.settings.clone(),
            self.run_flag.clone(),
        );
        tokio::spawn(worker.run())
    }
}

pub struct Supervisor {
    spawner: Arc<dyn WorkerSpawner>,
    registry: Arc<FeedRegistry>,
    run_flag: RunFlag,
    poll_interval: Duration,
}

impl Supervisor {
    pub fn new(
        spawner: Arc<dyn WorkerSpawner>,
        registry: Arc<FeedRegistry>,
        run_flag: RunFlag,
        poll_interval: Duration,
    ) -> Self {
        Self {
            spawner,
            registry,
            run_flag,
            poll_interval,
        }
    }

    /// Spawn the supervisor loop on the runtime.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        // ---
        let mut workers: BTreeMap<Feed, JoinHandle<()>> = Feed::ALL
            .iter()
            .map(|&feed| (feed, self.spawner.spawn(feed)))
            .collect();
        info!(
            workers = workers.len(),
            poll_secs = self.poll_interval.as_secs(),
            "Supervisor started"
        );

        while self.run_flag.sleep(self.poll_interval).await {
            let restarted = self.restart_finished(&mut workers).await;
            if restarted > 0 {
                warn!(restarted, "Supervisor replaced dead workers");
            }
        }

        info!("Supervisor stopping, waiting for workers");
        for (feed, handle) in workers {
            if let Err(e) = handle.await {
                warn!(feed = %feed, error = %e, "Worker ended abnormally during shutdown");
            }
        }
        info!("Supervisor stopped");
    }

    /// Replace every worker whose task has completed. Returns how many were restarted.
    async fn restart_finished(&self, workers: &mut BTreeMap<Feed, JoinHandle<()>>) -> usize {
        // ---
        let mut restarted = 0;
        for (&feed, handle) in workers.iter_mut() {
            if !handle.is_finished() || !self.run_flag.is_running() {
                continue;
            }

            match (&mut *handle).await {
                Ok(()) => error!(feed = %feed, "Worker exited unexpectedly, restarting"),
                Err(e) if e.is_panic() => error!(feed = %feed, "Worker panicked, restarting"),
                Err(e) => error!(feed = %feed, error = %e, "Worker failed, restarting"),
            }
            // Before the replacement can mark itself alive.
            self.registry.worker_stopped(feed, Utc::now());
            *handle = self.spawner.spawn(feed);
            restarted += 1;
        }
        restarted
    }
}
