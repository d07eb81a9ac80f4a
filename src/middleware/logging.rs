//! Request logging middleware.
//!
//! Wraps every HTTP request in an `http_request` span carrying a request id,
//! and logs method, path, status code and latency when it completes.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Middleware that logs HTTP requests with timing information.
///
/// An incoming `x-request-id` is kept; otherwise a UUID v4 is assigned. The
/// id is echoed on the response either way.
pub async fn request_logging(mut request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Skip logging for health checks to reduce noise
    if path == "/health" {
        return next.run(request).await;
    }

    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        request_id = %request_id,
    );

    let start = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }

    let _entered = span.enter();
    if status >= 500 {
        warn!(status, latency_ms, "Request failed (5xx)");
    } else if status >= 400 {
        info!(status, latency_ms, "Request completed (4xx)");
    } else {
        info!(status, latency_ms, "Request completed");
    }

    response
}
