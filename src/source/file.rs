//! Development backend: read saved table pages from disk.
//!
//! Expects `<dir>/water-level.html` and `<dir>/rainfall.html`. Files are
//! re-read on every fetch so edits show up as changes on the next tick.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::FixedOffset;

use super::{source_clock_now, table, SnapshotSource};
use crate::error::AcquisitionError;
use crate::models::{Feed, Snapshot};

#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
    utc_offset: FixedOffset,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>, utc_offset: FixedOffset) -> Self {
        Self {
            dir: dir.into(),
            utc_offset,
        }
    }

    fn page_path(&self, feed: Feed) -> PathBuf {
        self.dir.join(format!("{}.html", feed.slug()))
    }
}

#[async_trait]
impl SnapshotSource for FileSource {
    async fn fetch(&self, feed: Feed) -> Result<Snapshot, AcquisitionError> {
        // ---
        let path = self.page_path(feed);
        tracing::debug!(feed = %feed, path = %path.display(), "Reading table page");
        let html = tokio::fs::read_to_string(&path).await?;
        table::parse_snapshot(feed, &html, source_clock_now(self.utc_offset))
    }

    async fn probe(&self) -> Result<(), AcquisitionError> {
        // ---
        let meta = tokio::fs::metadata(&self.dir).await?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(AcquisitionError::Request(format!(
                "{} is not a directory",
                self.dir.display()
            )))
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
