//! Middleware for observability and abuse protection.
//!
//! This module provides:
//! - Request logging with request ids and latency tracking
//! - Login throttling per IP address

pub mod logging;
pub mod throttle;

pub use logging::request_logging;
pub use throttle::{LoginThrottle, ThrottleConfig};
