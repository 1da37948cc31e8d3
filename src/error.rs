//! Error taxonomy for the service.
//!
//! - [`AcquisitionError`] never leaves a feed worker; it drives retry and backoff.
//! - [`PersistenceError`] is logged by the worker and surfaced as a 500 only on
//!   the historical read path.
//! - [`ApiError`] is what crosses the HTTP boundary, rendered as the JSON error
//!   envelope `{status: "error", message, [error_details]}`.

use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use thiserror::Error;

use crate::models::Feed;

// ---

/// Failure to obtain a usable snapshot from the source.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("source request failed: {0}")]
    Request(String),

    #[error("source returned HTTP {0}")]
    Status(u16),

    #[error("acquisition timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not find {feed} data table")]
    TableNotFound { feed: Feed },

    #[error("no {feed} data was scraped")]
    Empty { feed: Feed },

    #[error("source io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for AcquisitionError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => AcquisitionError::Status(status.as_u16()),
            None => AcquisitionError::Request(e.to_string()),
        }
    }
}

/// Failure of the durable document store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored document is malformed: {0}")]
    Malformed(String),
}

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid date format. Please use YYYY-MM-DD")]
    InvalidDate,

    #[error("No data available for date {0}")]
    NoDataForDate(String),

    #[error("{} data not available yet", .0.label())]
    NotAvailable(Feed),

    #[error("{0}")]
    RateLimited(String),

    #[error("Internal server error")]
    Internal { details: Option<String> },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        // ---
        match self {
            ApiError::InvalidDate => StatusCode::BAD_REQUEST,
            ApiError::NoDataForDate(_) => StatusCode::NOT_FOUND,
            ApiError::NotAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status_code();
        let message = self.to_string();
        let error_details = match self {
            ApiError::Internal { details } => details,
            _ => None,
        };

        let body = ErrorEnvelope {
            status: "error",
            message,
            error_details,
        };
        (status, Json(body)).into_response()
    }
}
