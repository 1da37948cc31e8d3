//! Snapshot source adapters.
//!
//! A [`SnapshotSource`] turns a feed into a fresh [`Snapshot`]. The backend is
//! chosen once from configuration (`SOURCE_BACKEND`):
//! - `http`: fetches the live table page with `reqwest` ([`HttpSource`])
//! - `file`: reads `<feed>.html` from a directory ([`FileSource`]), for
//!   development against saved pages
//!
//! Both share the table parser in `table.rs`. Retry, timeout and backoff
//! are the feed worker's concern, not the adapter's.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDateTime, Utc};

use crate::config::{Config, SourceBackend};
use crate::error::AcquisitionError;
use crate::models::{Feed, Snapshot};

mod file;
mod http;
pub mod table;

pub use file::FileSource;
pub use http::HttpSource;

// ---

/// Capability to acquire one snapshot of a feed.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Acquire the current table for `feed`.
    async fn fetch(&self, feed: Feed) -> Result<Snapshot, AcquisitionError>;

    /// One-off startup check that the backend can operate at all.
    async fn probe(&self) -> Result<(), AcquisitionError> {
        Ok(())
    }

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// Per-feed target locations.
#[derive(Debug, Clone)]
pub struct SourceTargets {
    pub water_level: String,
    pub rainfall: String,
}

impl SourceTargets {
    pub fn for_feed(&self, feed: Feed) -> &str {
        // ---
        match feed {
            Feed::WaterLevel => &self.water_level,
            Feed::Rainfall => &self.rainfall,
        }
    }
}

/// Current wall-clock time on the source's local clock.
pub fn source_clock_now(offset: FixedOffset) -> NaiveDateTime {
    Utc::now().with_timezone(&offset).naive_local()
}

/// Build the backend selected by configuration.
pub fn from_config(cfg: &Config) -> Arc<dyn SnapshotSource> {
    // ---
    match cfg.source_backend {
        SourceBackend::Http => Arc::new(HttpSource::new(
            cfg.targets.clone(),
            cfg.fetch_timeout,
            cfg.source_utc_offset,
        )),
        SourceBackend::File => Arc::new(FileSource::new(
            cfg.source_file_dir.clone(),
            cfg.source_utc_offset,
        )),
    }
}
