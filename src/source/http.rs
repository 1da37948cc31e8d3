//! Live backend: fetch the table page over HTTPS.

use std::time::Duration;

use async_trait::async_trait;
use chrono::FixedOffset;
use tracing::{debug, info};

use super::{source_clock_now, table, SnapshotSource, SourceTargets};
use crate::error::AcquisitionError;
use crate::models::{Feed, Snapshot};

const USER_AGENT: &str = concat!("floodpath-monitor/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpSource {
    targets: SourceTargets,
    request_timeout: Duration,
    utc_offset: FixedOffset,
}

impl HttpSource {
    pub fn new(targets: SourceTargets, request_timeout: Duration, utc_offset: FixedOffset) -> Self {
        Self {
            targets,
            request_timeout,
            utc_offset,
        }
    }

    /// A fresh client per acquisition; nothing is pooled across iterations.
    fn build_client(&self) -> Result<reqwest::Client, AcquisitionError> {
        // ---
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| AcquisitionError::Request(format!("failed to build HTTP client: {}", e)))
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    async fn fetch(&self, feed: Feed) -> Result<Snapshot, AcquisitionError> {
        // ---
        let url = self.targets.for_feed(feed);
        debug!(feed = %feed, url, "Fetching table page");

        let client = self.build_client()?;
        let html = client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let snapshot = table::parse_snapshot(feed, &html, source_clock_now(self.utc_offset))?;
        info!(
            feed = %feed,
            readings = snapshot.readings.len(),
            captured_at = %snapshot.last_updated(),
            "Fetched table page"
        );
        Ok(snapshot)
    }

    async fn probe(&self) -> Result<(), AcquisitionError> {
        self.build_client().map(|_| ())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
