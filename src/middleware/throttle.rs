//! Login throttling middleware.
//!
//! Counts credential attempts per client IP in fixed windows and answers
//! 429 once a client exceeds its budget.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::RETRY_AFTER, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Once this many clients are tracked, elapsed windows are dropped on insert
const PRUNE_THRESHOLD: usize = 1024;

/// Configuration for login throttling.
#[derive(Clone, Debug)]
pub struct ThrottleConfig {
    /// Attempts allowed per client within one window.
    pub max_attempts: u32,
    pub window: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            window: Duration::from_secs(60),
        }
    }
}

/// Shared attempt counters keyed by client IP.
#[derive(Clone)]
pub struct LoginThrottle {
    config: ThrottleConfig,
    windows: Arc<Mutex<HashMap<IpAddr, AttemptWindow>>>,
}

struct AttemptWindow {
    attempts: u32,
    started: Instant,
}

#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Allowed,
    Throttled { retry_after: Duration },
}

impl LoginThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn record_attempt(&self, ip: IpAddr, now: Instant) -> Verdict {
        let mut windows = self.windows.lock();
        if windows.len() >= PRUNE_THRESHOLD && !windows.contains_key(&ip) {
            let period = self.config.window;
            windows.retain(|_, w| now.duration_since(w.started) < period);
            debug!("Pruned throttle windows, {} still tracked", windows.len());
        }

        let window = windows.entry(ip).or_insert(AttemptWindow {
            attempts: 0,
            started: now,
        });

        if now.duration_since(window.started) >= self.config.window {
            window.attempts = 0;
            window.started = now;
        }

        window.attempts += 1;

        if window.attempts > self.config.max_attempts {
            Verdict::Throttled {
                retry_after: (window.started + self.config.window).saturating_duration_since(now),
            }
        } else {
            Verdict::Allowed
        }
    }

    /// Drop windows that have fully elapsed; returns how many remain.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    fn prune_at(&self, now: Instant) -> usize {
        let window = self.config.window;
        let mut windows = self.windows.lock();
        windows.retain(|_, w| now.duration_since(w.started) < window);
        windows.len()
    }

    /// Length of one attempt window
    pub fn window(&self) -> Duration {
        self.config.window
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.windows.lock().len()
    }
}

/// Throttle middleware for credential endpoints.
///
/// Without `ConnectInfo` (e.g. when the router is driven in-process) every
/// caller shares a single bucket.
pub async fn throttle_middleware(
    State(throttle): State<LoginThrottle>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = connect_info
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match throttle.record_attempt(ip, Instant::now()) {
        Verdict::Allowed => next.run(request).await,
        Verdict::Throttled { retry_after } => {
            let retry_secs = retry_after.as_secs().max(1);
            warn!(
                ip = %ip,
                path = %request.uri().path(),
                retry_after_secs = retry_secs,
                "Too many credential attempts"
            );

            let body = serde_json::json!({
                "error": "too_many_attempts",
                "message": "Too many login attempts. Try again later.",
                "retry_after_seconds": retry_secs,
            });

            (
                StatusCode::TOO_MANY_REQUESTS,
                [(RETRY_AFTER, retry_secs.to_string())],
                axum::Json(body),
            )
                .into_response()
        }
    }
}
