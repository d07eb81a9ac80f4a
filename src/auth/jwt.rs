//! JWT Token Handler
//! Mission: Mint and verify signed, expiring access tokens

use crate::auth::models::{Claims, User};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::collections::HashSet;
use tracing::debug;

/// Default access token lifetime
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// JWT Handler for token operations
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    validity: Duration,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key
    pub fn new(secret: &str) -> Self {
        Self::with_validity(secret, Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS))
    }

    pub fn with_validity(secret: &str, validity: Duration) -> Self {
        // Expiry is checked by `is_token_valid` against the caller's principal,
        // so decoding only enforces the signature and claim presence.
        let mut validation = Validation::default();
        validation.validate_exp = false;
        validation.required_spec_claims =
            HashSet::from(["exp".to_string(), "sub".to_string()]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            validity,
        }
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Generate a JWT token for a user
    pub fn generate_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(self.validity)
            .context("Invalid timestamp")?;

        let claims = Claims {
            sub: user.email.clone(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
        };

        debug!(
            "Generating JWT for user {} ({}), expires in {}s",
            user.email,
            user.id,
            self.validity.num_seconds()
        );

        encode(&Header::default(), &claims, &self.encoding_key).context("Failed to generate JWT")
    }

    /// Verify the signature and return the embedded subject, ignoring expiry
    pub fn extract_subject(&self, token: &str) -> Result<String, TokenError> {
        self.decode_claims(token).map(|claims| claims.sub)
    }

    /// Signature verifies, subject matches `user` and the token has not expired
    pub fn is_token_valid(&self, token: &str, user: &User) -> bool {
        let claims = match self.decode_claims(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Rejected JWT: {}", e);
                return false;
            }
        };

        if claims.sub != user.email {
            debug!("JWT subject does not match user {}", user.id);
            return false;
        }

        if claims.exp <= Utc::now().timestamp() {
            debug!("JWT for {} expired at {}", claims.sub, claims.exp);
            return false;
        }

        true
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::Malformed)
    }
}

/// Token codec errors
#[derive(Debug)]
pub enum TokenError {
    /// Unparseable, wrongly signed, or missing required claims
    Malformed(jsonwebtoken::errors::Error),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed(e) => write!(f, "malformed access token: {}", e),
        }
    }
}

impl std::error::Error for TokenError {}
