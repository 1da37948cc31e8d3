//! Persistence gateway: durable storage of accepted snapshots.
//!
//! Three documents are maintained per feed:
//! - the latest accepted snapshot,
//! - one snapshot per calendar date (the last one accepted on that date),
//! - the DateIndex, the set of dates for which a dated snapshot exists.
//!
//! The backend is selected at startup: [`PgStore`] when `DATABASE_URL` is set,
//! [`MemoryStore`] otherwise.

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::models::{Feed, Snapshot};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type Result<T> = std::result::Result<T, PersistenceError>;

// ---

/// Durable document store consumed by feed workers and the query gateway.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Overwrite the feed's latest snapshot document.
    async fn put_latest(&self, feed: Feed, snapshot: &Snapshot) -> Result<()>;

    /// Overwrite the snapshot document for `date` (`YYYY-MM-DD`).
    async fn put_dated(&self, feed: Feed, date: &str, snapshot: &Snapshot) -> Result<()>;

    /// Add `date` to the feed's DateIndex. Whitespace is stripped first and
    /// adding a date that is already present is a no-op.
    async fn add_date(&self, feed: Feed, date: &str) -> Result<()>;

    /// Snapshot stored for `date`, or `None` if nothing was accepted that day.
    async fn get_dated(&self, feed: Feed, date: &str) -> Result<Option<Snapshot>>;

    /// Every known date for the feed, newest first.
    async fn list_known_dates(&self, feed: Feed) -> Result<Vec<String>>;
}

/// Canonical form of a DateIndex entry: all whitespace removed.
pub fn normalize_date(date: &str) -> String {
    date.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_normalize_date() {
        // ---
        assert_eq!(normalize_date(" 2024-01-05 "), "2024-01-05");
        assert_eq!(normalize_date("2024-01-05\n"), "2024-01-05");
        assert_eq!(normalize_date("\t2024-01-05"), "2024-01-05");
        assert_eq!(normalize_date("2024-01-05"), "2024-01-05");
    }
}
