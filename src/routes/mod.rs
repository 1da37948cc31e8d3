//! HTTP gateway for the query interface.
//!
//! Follows the Explicit Module Boundary Pattern (EMBP): each sibling module
//! exports a subrouter, and this gateway merges them, mounts the same set
//! under `/api/v1`, attaches the middleware and the shared [`AppState`].
//! `main.rs` only calls [`router`].
//!
//! Middleware order (outermost first): security headers, then the per-address
//! rate limiter. Rejected requests therefore still carry the headers.

use std::sync::Arc;

use axum::{middleware, Router};

use crate::health::HealthThresholds;
use crate::query::QueryGateway;
use crate::rate_limit::RateLimiter;
use crate::registry::FeedRegistry;
use crate::run_flag::RunFlag;

mod feeds;
mod health;
mod layers;

pub const API_PREFIX: &str = "/api/v1";

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<FeedRegistry>,
    pub query: QueryGateway,
    pub limiter: Arc<RateLimiter>,
    pub run_flag: RunFlag,
    pub health: HealthThresholds,
}

// ---

pub fn router(state: AppState) -> Router {
    // ---
    let api: Router<AppState> = Router::new()
        .merge(feeds::router())
        .merge(health::router());

    Router::new()
        .merge(api.clone())
        .nest(API_PREFIX, api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            layers::rate_limit,
        ))
        .layer(middleware::from_fn(layers::security_headers))
        .with_state(state)
}
