//! Authentication Middleware
//! Mission: Turn a bearer token into a request-scoped principal
//!
//! `authenticate` never rejects a request. It attaches a [`Principal`] to the
//! request extensions when the token checks out and otherwise lets the request
//! through anonymous; handlers that need identity extract `Principal` and get
//! a 401 when it is missing.

use crate::auth::{api::AuthState, models::Principal, models::UserRole};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

const BEARER_PREFIX: &str = "Bearer ";

/// Per-request authenticator; always continues the pipeline
pub async fn authenticate(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    if let Some(principal) = resolve_principal(&state, &req) {
        debug!("Authenticated request as {} ({})", principal.email, principal.role);
        req.extensions_mut().insert(principal);
    }

    next.run(req).await
}

fn resolve_principal(state: &AuthState, req: &Request) -> Option<Principal> {
    let token = bearer_token(req.headers())?;

    let subject = match state.jwt.extract_subject(token) {
        Ok(subject) => subject,
        Err(e) => {
            debug!("Ignoring bearer token: {}", e);
            return None;
        }
    };

    // Never override an identity attached earlier in the pipeline
    if req.extensions().get::<Principal>().is_some() {
        return None;
    }

    let user = match state.users.find_by_email(&subject) {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!("Bearer token subject {} has no account", subject);
            return None;
        }
        Err(e) => {
            error!("User lookup failed during authentication: {}", e);
            return None;
        }
    };

    if !state.jwt.is_token_valid(token, &user) {
        return None;
    }

    Some(Principal::from(&user))
}

/// Token after the literal `Bearer ` prefix, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix(BEARER_PREFIX))
}

impl Principal {
    /// Capability check at the handler boundary
    pub fn require(&self, role: UserRole) -> Result<(), AuthError> {
        if self.role.permits(role) {
            Ok(())
        } else {
            debug!("{} ({}) lacks {}", self.email, self.role, role);
            Err(AuthError::Forbidden)
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::Unauthorized)
    }
}

/// Auth error types
#[derive(Debug)]
pub enum AuthError {
    Unauthorized,
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "Insufficient permissions"),
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        db::AuthDb,
        jwt::JwtHandler,
        models::User,
        password::MIN_COST,
        refresh_store::RefreshTokenStore,
        service::SessionManager,
        user_store::{NewUser, UserStore},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{HeaderValue, Request as HttpRequest},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use chrono::Duration;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_state(secret: &str) -> (AuthState, User) {
        let db = AuthDb::in_memory().unwrap();
        let users = Arc::new(UserStore::new(db.clone()));
        let refresh_tokens = Arc::new(RefreshTokenStore::new(db));
        let jwt = Arc::new(JwtHandler::new(secret));
        let sessions = Arc::new(
            SessionManager::new(users.clone(), refresh_tokens, jwt.clone(), MIN_COST).unwrap(),
        );
        let user = users
            .create_user(NewUser {
                name: "Alice",
                email: "alice@example.com",
                username: "alice",
                password_hash: "hash".to_string(),
                role: UserRole::User,
            })
            .unwrap();
        (AuthState::new(sessions, users, jwt), user)
    }

    async fn whoami(principal: Option<Principal>) -> String {
        match principal {
            Some(p) => p.username,
            None => "anonymous".to_string(),
        }
    }

    fn app(state: AuthState) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(from_fn_with_state(state, authenticate))
    }

    async fn call(app: Router, req: HttpRequest<Body>) -> (StatusCode, String) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn with_auth(value: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .uri("/whoami")
            .header(AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_attaches_principal() {
        let (state, user) = create_state("middleware-secret");
        let token = state.jwt.generate_token(&user).unwrap();

        let (status, body) = call(app(state), with_auth(&format!("Bearer {}", token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "alice");
    }

    #[tokio::test]
    async fn test_missing_header_passes_through() {
        let (state, _) = create_state("middleware-secret");
        let req = HttpRequest::builder()
            .uri("/whoami")
            .body(Body::empty())
            .unwrap();

        let (status, body) = call(app(state), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_passes_through() {
        let (state, user) = create_state("middleware-secret");
        let token = state.jwt.generate_token(&user).unwrap();

        for header in [format!("bearer {}", token), format!("Basic {}", token), token] {
            let (status, body) = call(app(state.clone()), with_auth(&header)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "anonymous");
        }
    }

    #[tokio::test]
    async fn test_foreign_secret_never_authenticates() {
        let (state, user) = create_state("middleware-secret");
        let forged = JwtHandler::new("attacker-secret").generate_token(&user).unwrap();

        let (status, body) = call(app(state), with_auth(&format!("Bearer {}", forged))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn test_expired_token_stays_anonymous() {
        let (state, user) = create_state("middleware-secret");
        let expired = JwtHandler::with_validity("middleware-secret", Duration::seconds(-60))
            .generate_token(&user)
            .unwrap();

        let (_, body) = call(app(state), with_auth(&format!("Bearer {}", expired))).await;
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn test_token_for_unknown_user_stays_anonymous() {
        let (state, user) = create_state("middleware-secret");
        let ghost = User {
            email: "ghost@example.com".to_string(),
            ..user
        };
        let token = state.jwt.generate_token(&ghost).unwrap();

        let (_, body) = call(app(state), with_auth(&format!("Bearer {}", token))).await;
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn test_existing_principal_is_not_overridden() {
        let (state, user) = create_state("middleware-secret");
        let token = state.jwt.generate_token(&user).unwrap();

        let preset = Principal {
            user_id: 99,
            email: "forwarded@example.com".to_string(),
            username: "forwarded".to_string(),
            role: UserRole::Admin,
        };
        let mut req = with_auth(&format!("Bearer {}", token));
        req.extensions_mut().insert(preset);

        let (_, body) = call(app(state), req).await;
        assert_eq!(body, "forwarded");
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_require_role() {
        let user = Principal {
            user_id: 1,
            email: "u@example.com".to_string(),
            username: "u".to_string(),
            role: UserRole::User,
        };
        assert!(user.require(UserRole::User).is_ok());
        assert!(matches!(user.require(UserRole::Admin), Err(AuthError::Forbidden)));

        let admin = Principal {
            role: UserRole::Admin,
            ..user
        };
        assert!(admin.require(UserRole::Admin).is_ok());
    }

    #[test]
    fn test_auth_error_responses() {
        assert_eq!(
            AuthError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
