//! PostgreSQL document store (see `schema.rs` for the tables).

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::types::Json;
use sqlx::PgPool;

use super::{normalize_date, Result, SnapshotStore};
use crate::error::PersistenceError;
use crate::models::{Feed, Reading, Snapshot, DATE_FORMAT};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_day(date: &str) -> Result<NaiveDate> {
    // ---
    let date = normalize_date(date);
    NaiveDate::parse_from_str(&date, DATE_FORMAT)
        .map_err(|e| PersistenceError::Malformed(format!("date '{}': {}", date, e)))
}

#[async_trait]
impl SnapshotStore for PgStore {
    async fn put_latest(&self, feed: Feed, snapshot: &Snapshot) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO feed_latest (feed, readings, last_updated, stored_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (feed) DO UPDATE SET
                readings     = EXCLUDED.readings,
                last_updated = EXCLUDED.last_updated,
                stored_at    = now()
            "#,
        )
        .bind(feed.collection())
        .bind(Json(&snapshot.readings))
        .bind(snapshot.captured_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn put_dated(&self, feed: Feed, date: &str, snapshot: &Snapshot) -> Result<()> {
        // ---
        let day = parse_day(date)?;
        sqlx::query(
            r#"
            INSERT INTO feed_dated (feed, day, readings, last_updated, stored_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (feed, day) DO UPDATE SET
                readings     = EXCLUDED.readings,
                last_updated = EXCLUDED.last_updated,
                stored_at    = now()
            "#,
        )
        .bind(feed.collection())
        .bind(day)
        .bind(Json(&snapshot.readings))
        .bind(snapshot.captured_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn add_date(&self, feed: Feed, date: &str) -> Result<()> {
        // ---
        let day = parse_day(date)?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO feed_dates (feed, day) VALUES ($1, $2)
            ON CONFLICT (feed, day) DO NOTHING
            "#,
        )
        .bind(feed.collection())
        .bind(day)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            tracing::info!(feed = %feed, date = %day, "Added date to index");
        } else {
            tracing::debug!(feed = %feed, date = %day, "Date already indexed");
        }
        Ok(())
    }

    async fn get_dated(&self, feed: Feed, date: &str) -> Result<Option<Snapshot>> {
        // ---
        let day = parse_day(date)?;
        let row: Option<(Json<Vec<Reading>>, NaiveDateTime)> = sqlx::query_as(
            r#"
            SELECT readings, last_updated FROM feed_dated
            WHERE feed = $1 AND day = $2
            "#,
        )
        .bind(feed.collection())
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(Json(readings), captured_at)| Snapshot::new(readings, captured_at)))
    }

    async fn list_known_dates(&self, feed: Feed) -> Result<Vec<String>> {
        // ---
        let rows: Vec<(NaiveDate,)> = sqlx::query_as(
            r#"
            SELECT day FROM feed_dates WHERE feed = $1 ORDER BY day DESC
            "#,
        )
        .bind(feed.collection())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(day,)| day.format(DATE_FORMAT).to_string())
            .collect())
    }
}
