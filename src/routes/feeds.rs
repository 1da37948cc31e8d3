//! Feed data endpoints.
//!
//! - `GET /water-level[?date=YYYY-MM-DD]`
//! - `GET /rainfall[?date=YYYY-MM-DD]`
//! - `GET /water-level/dates`, `GET /rainfall/dates`
//!
//! Without `date` the latest accepted snapshot is served from memory; with it
//! the date-partitioned document is read from the store.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AppState;
use crate::error::ApiError;
use crate::models::{Feed, Reading};

/// Query parameters of the feed endpoints.
#[derive(Debug, Deserialize)]
pub struct DateQuery {
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct FeedResponse {
    status: &'static str,
    data: Vec<Reading>,
    last_updated: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct DatesResponse {
    status: &'static str,
    dates: Vec<String>,
    timestamp: DateTime<Utc>,
}

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/water-level", get(water_level))
        .route("/water-level/dates", get(water_level_dates))
        .route("/rainfall", get(rainfall))
        .route("/rainfall/dates", get(rainfall_dates))
}

async fn water_level(
    state: State<AppState>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> Result<Json<FeedResponse>, ApiError> {
    feed_data(Feed::WaterLevel, state, query).await
}

async fn rainfall(
    state: State<AppState>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> Result<Json<FeedResponse>, ApiError> {
    feed_data(Feed::Rainfall, state, query).await
}

async fn water_level_dates(state: State<AppState>) -> Result<Json<DatesResponse>, ApiError> {
    known_dates(Feed::WaterLevel, state).await
}

async fn rainfall_dates(state: State<AppState>) -> Result<Json<DatesResponse>, ApiError> {
    known_dates(Feed::Rainfall, state).await
}

async fn feed_data(
    feed: Feed,
    State(state): State<AppState>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> Result<Json<FeedResponse>, ApiError> {
    // ---
    let Query(params) = query.map_err(|rejection| {
        debug!(feed = %feed, error = %rejection, "Rejected query string");
        ApiError::InvalidDate
    })?;
    let date = params.date.filter(|d| !d.trim().is_empty());
    debug!(feed = %feed, date = ?date, "GET feed data");

    let (data, last_updated) = match date {
        Some(date) => {
            let snapshot = state.query.by_date(feed, &date).await?;
            let last_updated = snapshot.last_updated();
            (snapshot.readings, last_updated)
        }
        None => {
            let entry = state.query.latest(feed)?;
            (entry.snapshot.readings.clone(), entry.snapshot.last_updated())
        }
    };

    Ok(Json(FeedResponse {
        status: "success",
        data,
        last_updated,
        timestamp: Utc::now(),
    }))
}

async fn known_dates(
    feed: Feed,
    State(state): State<AppState>,
) -> Result<Json<DatesResponse>, ApiError> {
    // ---
    let dates = state.query.known_dates(feed).await?;
    Ok(Json(DatesResponse {
        status: "success",
        dates,
        timestamp: Utc::now(),
    }))
}
