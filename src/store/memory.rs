//! In-process document store.
//!
//! Used when no database is configured and as the store in tests. Nothing
//! survives a restart.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{normalize_date, Result, SnapshotStore};
use crate::models::{Feed, Snapshot};

#[derive(Debug, Default)]
struct Documents {
    latest: HashMap<Feed, Snapshot>,
    dated: HashMap<(Feed, String), Snapshot>,
    dates: HashMap<Feed, BTreeSet<String>>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<Documents>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write operations accepted so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// The latest document for a feed, if one was written.
    pub fn latest(&self, feed: Feed) -> Option<Snapshot> {
        // ---
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        docs.latest.get(&feed).cloned()
    }

    fn write<R>(&self, f: impl FnOnce(&mut Documents) -> R) -> R {
        // ---
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        self.writes.fetch_add(1, Ordering::Relaxed);
        f(&mut docs)
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn put_latest(&self, feed: Feed, snapshot: &Snapshot) -> Result<()> {
        self.write(|docs| docs.latest.insert(feed, snapshot.clone()));
        Ok(())
    }

    async fn put_dated(&self, feed: Feed, date: &str, snapshot: &Snapshot) -> Result<()> {
        let key = (feed, normalize_date(date));
        self.write(|docs| docs.dated.insert(key, snapshot.clone()));
        Ok(())
    }

    async fn add_date(&self, feed: Feed, date: &str) -> Result<()> {
        // ---
        let date = normalize_date(date);
        let added = self.write(|docs| docs.dates.entry(feed).or_default().insert(date.clone()));
        if added {
            tracing::info!(feed = %feed, date = %date, "Added date to index");
        } else {
            tracing::debug!(feed = %feed, date = %date, "Date already indexed");
        }
        Ok(())
    }

    async fn get_dated(&self, feed: Feed, date: &str) -> Result<Option<Snapshot>> {
        // ---
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.dated.get(&(feed, normalize_date(date))).cloned())
    }

    async fn list_known_dates(&self, feed: Feed) -> Result<Vec<String>> {
        // ---
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs
            .dates
            .get(&feed)
            .map(|dates| dates.iter().rev().cloned().collect())
            .unwrap_or_default())
    }
}
