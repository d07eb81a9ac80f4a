//! Session Manager
//! Mission: Register, log in, refresh and log out users
//!
//! All methods are synchronous: SQLite and bcrypt both block, so async
//! callers should run them on `tokio::task::spawn_blocking`.

use crate::auth::db::StoreError;
use crate::auth::jwt::JwtHandler;
use crate::auth::models::{
    AuthResponse, LoginResponse, RefreshToken, User, UserRole, VerifiedRefreshToken,
};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::refresh_store::RefreshTokenStore;
use crate::auth::user_store::{NewUser, UserStore};
use anyhow::anyhow;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Refresh tokens live for 14 days unless configured otherwise
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 14;

pub struct SessionManager {
    users: Arc<UserStore>,
    refresh_tokens: Arc<RefreshTokenStore>,
    jwt: Arc<JwtHandler>,
    refresh_ttl: Duration,
    bcrypt_cost: u32,
    // Verified against when the email is unknown, so both failure paths cost a bcrypt check
    dummy_hash: String,
}

impl SessionManager {
    pub fn new(
        users: Arc<UserStore>,
        refresh_tokens: Arc<RefreshTokenStore>,
        jwt: Arc<JwtHandler>,
        bcrypt_cost: u32,
    ) -> anyhow::Result<Self> {
        let dummy_hash = hash_password("dummy-password-for-timing", bcrypt_cost)?;
        Ok(Self {
            users,
            refresh_tokens,
            jwt,
            refresh_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            bcrypt_cost,
            dummy_hash,
        })
    }

    pub fn with_refresh_ttl(mut self, refresh_ttl: Duration) -> Self {
        self.refresh_ttl = refresh_ttl;
        self
    }

    /// Create a USER account and open its first session
    pub fn register(
        &self,
        name: &str,
        email: &str,
        username: &str,
        raw_password: &str,
    ) -> Result<LoginResponse, SessionError> {
        let password_hash =
            hash_password(raw_password, self.bcrypt_cost).map_err(SessionError::Internal)?;

        let user = self
            .users
            .create_user(NewUser {
                name,
                email,
                username,
                password_hash,
                role: UserRole::User,
            })
            .map_err(|e| match e {
                StoreError::Conflict(_) => SessionError::DuplicateIdentity,
                other => other.into(),
            })?;

        info!("🆕 Registered {} as {}", user.email, user.username);
        self.open_session(&user)
    }

    /// Check credentials and open a session; never says which part was wrong
    pub fn login(&self, email: &str, raw_password: &str) -> Result<LoginResponse, SessionError> {
        let user = match self.users.find_by_email(email)? {
            Some(user) => user,
            None => {
                // Burn the same bcrypt cost as a real mismatch
                let _ = verify_password(raw_password, &self.dummy_hash);
                warn!("❌ Failed login attempt: {}", email);
                return Err(SessionError::InvalidCredentials);
            }
        };

        let valid =
            verify_password(raw_password, &user.password_hash).map_err(SessionError::Internal)?;
        if !valid {
            warn!("❌ Failed login attempt: {}", email);
            return Err(SessionError::InvalidCredentials);
        }

        info!("✅ Login successful: {} ({})", user.email, user.role);
        self.open_session(&user)
    }

    /// Return the user's live refresh token, minting one if there is none
    pub fn get_or_create_refresh_token(&self, email: &str) -> Result<RefreshToken, SessionError> {
        let user = self
            .users
            .find_by_email(email)?
            .ok_or_else(|| SessionError::UnknownUser(email.to_string()))?;
        self.refresh_token_for(&user)
    }

    /// Look up a refresh token; an expired one is deleted and rejected
    pub fn verify_refresh_token(&self, token: &str) -> Result<VerifiedRefreshToken, SessionError> {
        let refresh_token = self
            .refresh_tokens
            .find_by_token(token)?
            .ok_or(SessionError::RefreshTokenNotFound)?;

        if refresh_token.is_expired(Utc::now()) {
            self.refresh_tokens.delete_by_token(&refresh_token.token)?;
            info!(
                "⌛ Refresh token {}… expired for user {}",
                refresh_token.redacted(),
                refresh_token.user_id
            );
            return Err(SessionError::RefreshTokenExpired);
        }

        let user = self
            .users
            .find_by_id(refresh_token.user_id)?
            .ok_or_else(|| SessionError::UnknownUser(refresh_token.user_id.to_string()))?;

        Ok(VerifiedRefreshToken {
            refresh_token,
            user,
        })
    }

    /// New access token for the owner; the refresh token itself is not rotated
    pub fn refresh(&self, token: &str) -> Result<AuthResponse, SessionError> {
        let verified = self.verify_refresh_token(token)?;
        let access_token = self
            .jwt
            .generate_token(&verified.user)
            .map_err(SessionError::Internal)?;

        debug!("🔄 Refreshed access token for {}", verified.user.email);
        Ok(AuthResponse {
            access_token,
            refresh_token: verified.refresh_token.token,
        })
    }

    /// Idempotent; an unknown or already-expired token is not an error
    pub fn logout(&self, token: &str) -> Result<(), SessionError> {
        self.refresh_tokens.delete_by_token(token)?;
        info!("👋 Logged out refresh token {}…", crate::auth::models::redact(token));
        Ok(())
    }

    fn open_session(&self, user: &User) -> Result<LoginResponse, SessionError> {
        let access_token = self
            .jwt
            .generate_token(user)
            .map_err(SessionError::Internal)?;
        let refresh_token = self.refresh_token_for(user)?;

        Ok(LoginResponse {
            access_token,
            refresh_token: refresh_token.token,
            username: user.username.clone(),
            role: user.role,
        })
    }

    fn refresh_token_for(&self, user: &User) -> Result<RefreshToken, SessionError> {
        let now = Utc::now();

        if let Some(existing) = self.refresh_tokens.find_by_user(user.id)? {
            if !existing.is_expired(now) {
                return Ok(existing);
            }
            debug!(
                "Replacing expired refresh token {}… for {}",
                existing.redacted(),
                user.email
            );
            self.refresh_tokens.delete_by_token(&existing.token)?;
        }

        let candidate = RefreshToken::issue(user.id, now + self.refresh_ttl);
        match self.refresh_tokens.save(&candidate) {
            Ok(()) => Ok(candidate),
            Err(StoreError::Conflict(_)) => {
                // A concurrent login stored its token first; that one wins
                debug!("Lost refresh token race for {}, reusing winner", user.email);
                self.refresh_tokens.find_by_user(user.id)?.ok_or_else(|| {
                    SessionError::Internal(anyhow!(
                        "refresh token for user {} vanished after conflict",
                        user.id
                    ))
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Session lifecycle errors
#[derive(Debug)]
pub enum SessionError {
    DuplicateIdentity,
    InvalidCredentials,
    UnknownUser(String),
    RefreshTokenNotFound,
    RefreshTokenExpired,
    Internal(anyhow::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::DuplicateIdentity => write!(f, "Email or username already registered"),
            SessionError::InvalidCredentials => write!(f, "Invalid email or password"),
            SessionError::UnknownUser(who) => write!(f, "User not found: {}", who),
            SessionError::RefreshTokenNotFound => write!(f, "Refresh token not found"),
            SessionError::RefreshTokenExpired => write!(f, "Refresh token expired"),
            SessionError::Internal(e) => write!(f, "Internal error: {:#}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        SessionError::Internal(e.into())
    }
}
