//! Request middleware shared by every route.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header::{self, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::error::ApiError;

const SECURITY_HEADERS: [(HeaderName, &str); 5] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_XSS_PROTECTION, "1; mode=block"),
    (
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=31536000; includeSubDomains",
    ),
    (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
];

/// Gate every request on the caller's minute and hour windows.
///
/// The caller is identified by the peer address from `ConnectInfo`. A router
/// served without connect info keys everything on `0.0.0.0`.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    // ---
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match state.limiter.check(ip, Instant::now()) {
        Ok(()) => next.run(req).await,
        Err(exceeded) => ApiError::RateLimited(exceeded.to_string()).into_response(),
    }
}

pub async fn security_headers(req: Request, next: Next) -> Response {
    // ---
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}
