//! Read side of the service.
//!
//! `latest` is answered from the registry alone and never waits on the store.
//! `by_date` validates the date before touching the store, so a malformed
//! date and a missing date are distinct outcomes (400 vs 404).

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::error;

use crate::error::{ApiError, PersistenceError};
use crate::models::{Feed, Snapshot, DATE_FORMAT};
use crate::registry::{FeedRegistry, LatestEntry};
use crate::store::SnapshotStore;

#[derive(Clone)]
pub struct QueryGateway {
    registry: Arc<FeedRegistry>,
    store: Arc<dyn SnapshotStore>,
    expose_error_details: bool,
}

impl QueryGateway {
    pub fn new(
        registry: Arc<FeedRegistry>,
        store: Arc<dyn SnapshotStore>,
        expose_error_details: bool,
    ) -> Self {
        Self {
            registry,
            store,
            expose_error_details,
        }
    }

    /// Most recently accepted snapshot of `feed`.
    pub fn latest(&self, feed: Feed) -> Result<LatestEntry, ApiError> {
        self.registry.latest(feed).ok_or(ApiError::NotAvailable(feed))
    }

    /// Snapshot stored for a `YYYY-MM-DD` date.
    pub async fn by_date(&self, feed: Feed, date: &str) -> Result<Snapshot, ApiError> {
        // ---
        let day = parse_date(date)?;
        let key = day.format(DATE_FORMAT).to_string();

        match self.store.get_dated(feed, &key).await {
            Ok(Some(snapshot)) => Ok(snapshot),
            Ok(None) => Err(ApiError::NoDataForDate(key)),
            Err(e) => Err(self.internal(feed, e)),
        }
    }

    /// The feed's DateIndex, newest first.
    pub async fn known_dates(&self, feed: Feed) -> Result<Vec<String>, ApiError> {
        self.store
            .list_known_dates(feed)
            .await
            .map_err(|e| self.internal(feed, e))
    }

    fn internal(&self, feed: Feed, e: PersistenceError) -> ApiError {
        // ---
        error!(feed = %feed, error = %e, "Store read failed");
        ApiError::Internal {
            details: self.expose_error_details.then(|| e.to_string()),
        }
    }
}

/// Strict `YYYY-MM-DD` calendar date.
fn parse_date(date: &str) -> Result<NaiveDate, ApiError> {
    // ---
    let date = date.trim();
    if date.len() != 10 {
        return Err(ApiError::InvalidDate);
    }
    NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_| ApiError::InvalidDate)
}
