//! Application wiring
//! Mission: Assemble stores, session manager and routes from settings

use crate::auth::{
    auth_router, AuthDb, AuthState, JwtHandler, RefreshTokenStore, SessionManager, UserStore,
};
use crate::config::Settings;
use crate::middleware::{request_logging, LoginThrottle};
use anyhow::{Context, Result};
use axum::{middleware::from_fn, routing::get, Router};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

/// Everything the HTTP layer and background tasks share
pub struct App {
    pub state: AuthState,
    pub refresh_tokens: Arc<RefreshTokenStore>,
    pub throttle: LoginThrottle,
}

impl App {
    pub fn new(db: AuthDb, settings: &Settings) -> Result<Self> {
        let users = Arc::new(UserStore::new(db.clone()));
        let refresh_tokens = Arc::new(RefreshTokenStore::new(db));
        let jwt = Arc::new(JwtHandler::with_validity(
            &settings.jwt_secret,
            settings.access_token_ttl,
        ));
        let sessions = SessionManager::new(
            users.clone(),
            refresh_tokens.clone(),
            jwt.clone(),
            settings.bcrypt_cost,
        )
        .context("Failed to initialize session manager")?
        .with_refresh_ttl(settings.refresh_token_ttl);
        info!(
            "🔑 Access tokens valid for {}s, refresh tokens for {}d",
            jwt.validity().num_seconds(),
            settings.refresh_token_ttl.num_days()
        );

        Ok(Self {
            state: AuthState::new(Arc::new(sessions), users, jwt),
            refresh_tokens,
            throttle: LoginThrottle::new(settings.throttle.clone()),
        })
    }

    /// Public router: `/health` plus the auth API under `/api/v1`
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .nest(
                "/api/v1",
                auth_router(self.state.clone(), self.throttle.clone()),
            )
            .layer(from_fn(request_logging))
            .layer(CorsLayer::permissive())
    }

    /// Periodically purge expired refresh tokens
    pub fn spawn_janitor(&self, interval: Duration) -> JoinHandle<()> {
        let refresh_tokens = self.refresh_tokens.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;

                let store = refresh_tokens.clone();
                match tokio::task::spawn_blocking(move || store.purge_expired(Utc::now())).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => error!("Refresh token purge failed: {}", e),
                    Err(e) => error!("Refresh token purge task panicked: {}", e),
                }
            }
        })
    }

    /// Drop elapsed throttle windows once per window
    pub fn spawn_throttle_pruner(&self) -> JoinHandle<()> {
        let throttle = self.throttle.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(throttle.window());
            loop {
                ticker.tick().await;
                let tracked = throttle.prune();
                debug!("Throttle pruned, {} windows tracked", tracked);
            }
        })
    }
}

async fn health_check() -> &'static str {
    "OK"
}
