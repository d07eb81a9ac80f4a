//! Server configuration
//!
//! Every flag can also come from the environment (and therefore from `.env`).
//!
//! Environment:
//!   AUTH_BIND_ADDR - Listen address (default: 0.0.0.0:8080)
//!   AUTH_DB_PATH - SQLite file for users and refresh tokens
//!   JWT_SECRET - HMAC secret for access tokens
//!   ACCESS_TOKEN_TTL_SECS - Access token lifetime (default: 900)
//!   REFRESH_TOKEN_TTL_DAYS - Refresh token lifetime (default: 14)
//!   BCRYPT_COST - bcrypt work factor (default: 12)
//!   REFRESH_JANITOR_INTERVAL_SECS - Expired token sweep interval, 0 disables
//!   LOGIN_ATTEMPTS_PER_MINUTE - Credential attempts per client IP

use crate::auth::jwt::DEFAULT_ACCESS_TOKEN_TTL_SECS;
use crate::auth::service::DEFAULT_REFRESH_TOKEN_TTL_DAYS;
use crate::middleware::ThrottleConfig;
use anyhow::{bail, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret-change-in-production-minimum-32-characters";
const MIN_SECRET_LEN: usize = 32;

#[derive(Parser, Debug, Clone)]
#[command(name = "movie-api")]
#[command(about = "Movie API authentication service")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "AUTH_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// SQLite database holding users and refresh tokens
    #[arg(long, env = "AUTH_DB_PATH", default_value = "movie_api_auth.db")]
    pub db_path: String,

    /// HMAC secret used to sign access tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL_SECS", default_value_t = DEFAULT_ACCESS_TOKEN_TTL_SECS)]
    pub access_token_ttl_secs: i64,

    /// Refresh token lifetime in days
    #[arg(long, env = "REFRESH_TOKEN_TTL_DAYS", default_value_t = DEFAULT_REFRESH_TOKEN_TTL_DAYS)]
    pub refresh_token_ttl_days: i64,

    /// bcrypt work factor
    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Seconds between expired refresh token sweeps (0 disables the janitor)
    #[arg(long, env = "REFRESH_JANITOR_INTERVAL_SECS", default_value_t = 0)]
    pub janitor_interval_secs: u64,

    /// Credential attempts allowed per client IP per minute
    #[arg(long, env = "LOGIN_ATTEMPTS_PER_MINUTE", default_value_t = 20)]
    pub login_attempts_per_minute: u32,
}

/// Validated runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: SocketAddr,
    pub db_path: String,
    pub jwt_secret: String,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    pub bcrypt_cost: u32,
    pub janitor_interval: Option<Duration>,
    pub throttle: ThrottleConfig,
}

impl Args {
    pub fn into_settings(self) -> Result<Settings> {
        if !(4..=31).contains(&self.bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31, got {}", self.bcrypt_cost);
        }
        if self.access_token_ttl_secs <= 0 {
            bail!("ACCESS_TOKEN_TTL_SECS must be positive");
        }
        if self.refresh_token_ttl_days <= 0 {
            bail!("REFRESH_TOKEN_TTL_DAYS must be positive");
        }
        if self.login_attempts_per_minute == 0 {
            bail!("LOGIN_ATTEMPTS_PER_MINUTE must be at least 1");
        }

        let jwt_secret = match self.jwt_secret {
            Some(secret) if !secret.trim().is_empty() => {
                if secret.len() < MIN_SECRET_LEN {
                    warn!("⚠️  JWT_SECRET is shorter than {} characters", MIN_SECRET_LEN);
                }
                secret
            }
            _ => {
                warn!("⚠️  JWT_SECRET not set, using development secret. CHANGE IN PRODUCTION!");
                DEV_JWT_SECRET.to_string()
            }
        };

        Ok(Settings {
            bind: self.bind,
            db_path: self.db_path,
            jwt_secret,
            access_token_ttl: chrono::Duration::seconds(self.access_token_ttl_secs),
            refresh_token_ttl: chrono::Duration::days(self.refresh_token_ttl_days),
            bcrypt_cost: self.bcrypt_cost,
            janitor_interval: (self.janitor_interval_secs > 0)
                .then(|| Duration::from_secs(self.janitor_interval_secs)),
            throttle: ThrottleConfig {
                max_attempts: self.login_attempts_per_minute,
                window: Duration::from_secs(60),
            },
        })
    }
}
