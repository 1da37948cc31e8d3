//! Database schema management for `floodpath-monitor`.
//!
//! Ensures the snapshot document tables exist before workers start writing.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates `feed_latest` (one row per feed), `feed_dated` (one row per feed
/// and calendar date) and `feed_dates` (the DateIndex). `stored_at` columns
/// default to the server clock. Safe to call on every startup; no-op if
/// objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Latest accepted snapshot per feed
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feed_latest (
            feed          TEXT        PRIMARY KEY,
            readings      JSONB       NOT NULL,
            last_updated  TIMESTAMP   NOT NULL,
            stored_at     TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Date-partitioned snapshots, last accepted one per day wins
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feed_dated (
            feed          TEXT        NOT NULL,
            day           DATE        NOT NULL,
            readings      JSONB       NOT NULL,
            last_updated  TIMESTAMP   NOT NULL,
            stored_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (feed, day)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // DateIndex
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feed_dates (
            feed      TEXT        NOT NULL,
            day       DATE        NOT NULL,
            added_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (feed, day)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
