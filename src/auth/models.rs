//! Authentication Models
//! Mission: Define the user, token and wire types shared by the auth subsystem

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account as held by the credential store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String, // authentication subject
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: UserRole,
    pub created_at: String,
}

/// User roles for RBAC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum UserRole {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "ADMIN")]
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Some(UserRole::User),
            "ADMIN" => Some(UserRole::Admin),
            _ => None,
        }
    }

    /// Capability check: does holding `self` satisfy a requirement of `required`?
    pub fn permits(&self, required: UserRole) -> bool {
        match (self, required) {
            (UserRole::Admin, _) => true,
            (UserRole::User, UserRole::User) => true,
            (UserRole::User, UserRole::Admin) => false,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user email)
    pub iat: i64,
    pub exp: i64, // expiration timestamp, seconds
}

/// Persisted refresh token, one per user at most
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Mint a fresh opaque token for `user_id`
    pub fn issue(user_id: i64, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            user_id,
            expires_at,
        }
    }

    /// Expired at or before `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Short prefix for log lines; the full value is a credential
    pub fn redacted(&self) -> &str {
        redact(&self.token)
    }
}

pub(crate) fn redact(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}

/// Refresh token that passed verification, with its owner resolved
#[derive(Debug, Clone)]
pub struct VerifiedRefreshToken {
    pub refresh_token: RefreshToken,
    pub user: User,
}

/// Authenticated identity attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub email: String,
    pub username: String,
    pub role: UserRole,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// Register request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Logout request body; a missing field is a 400, not a parse failure
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Register/login response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub username: String,
    pub role: UserRole,
}

/// Refresh response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Current user (sanitized)
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub username: String,
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_user_role_serialization() {
        let admin = UserRole::Admin;
        let json = serde_json::to_string(&admin).unwrap();
        assert_eq!(json, r#""ADMIN""#);

        let user: UserRole = serde_json::from_str(r#""USER""#).unwrap();
        assert_eq!(user, UserRole::User);
    }

    #[test]
    fn test_user_role_string_conversion() {
        assert_eq!(UserRole::Admin.as_str(), "ADMIN");
        assert_eq!(UserRole::parse("user"), Some(UserRole::User));
        assert_eq!(UserRole::parse("Admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("trader"), None);
    }

    #[test]
    fn test_role_capabilities() {
        assert!(UserRole::Admin.permits(UserRole::Admin));
        assert!(UserRole::Admin.permits(UserRole::User));
        assert!(UserRole::User.permits(UserRole::User));
        assert!(!UserRole::User.permits(UserRole::Admin));
    }

    #[test]
    fn test_refresh_token_expiry_boundary() {
        let now = Utc::now();
        let token = RefreshToken::issue(1, now);
        assert!(token.is_expired(now));
        assert!(!token.is_expired(now - Duration::seconds(1)));
    }

    #[test]
    fn test_refresh_tokens_are_unique() {
        let expires = Utc::now() + Duration::days(14);
        let a = RefreshToken::issue(1, expires);
        let b = RefreshToken::issue(1, expires);
        assert_ne!(a.token, b.token);
        assert_eq!(a.redacted().len(), 8);
    }

    #[test]
    fn test_login_response_uses_camel_case() {
        let response = LoginResponse {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            username: "alice".to_string(),
            role: UserRole::User,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
        assert_eq!(json["role"], "USER");
    }

    #[test]
    fn test_logout_request_tolerates_missing_field() {
        let req: LogoutRequest = serde_json::from_str("{}").unwrap();
        assert!(req.refresh_token.is_none());
    }
}
