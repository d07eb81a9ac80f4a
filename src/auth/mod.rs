//! Authentication Module
//! Mission: Bearer-token authentication with renewable sessions

pub mod api;
pub mod db;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod refresh_store;
pub mod service;
pub mod user_store;

pub use api::{auth_router, AuthState};
pub use db::{AuthDb, StoreError};
pub use jwt::{JwtHandler, TokenError};
pub use middleware::authenticate;
pub use models::{Principal, UserRole};
pub use refresh_store::RefreshTokenStore;
pub use service::{SessionError, SessionManager};
pub use user_store::UserStore;
