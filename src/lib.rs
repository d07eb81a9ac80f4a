//! Movie API Auth Backend Library
//!
//! Token-based authentication with renewable sessions: a JWT codec, SQLite
//! stores for users and refresh tokens, the session manager, and the axum
//! middleware that turns a bearer token into a request principal.

pub mod app;
pub mod auth;
pub mod config;
pub mod middleware;

pub use app::App;
