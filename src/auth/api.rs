//! Authentication API Endpoints
//! Mission: Expose register, login, refresh, logout and me over HTTP

use crate::auth::{
    jwt::JwtHandler,
    middleware::authenticate,
    models::{
        AuthResponse, LoginRequest, LoginResponse, LogoutRequest, MeResponse, Principal,
        RefreshTokenRequest, RegisterRequest,
    },
    service::{SessionError, SessionManager},
    user_store::UserStore,
};
use crate::middleware::throttle::{throttle_middleware, LoginThrottle};
use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tracing::{error, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<SessionManager>,
    pub users: Arc<UserStore>,
    pub jwt: Arc<JwtHandler>,
}

impl AuthState {
    pub fn new(sessions: Arc<SessionManager>, users: Arc<UserStore>, jwt: Arc<JwtHandler>) -> Self {
        Self {
            sessions,
            users,
            jwt,
        }
    }
}

/// Routes under `/auth`, with the authenticator applied to all of them
pub fn auth_router(state: AuthState, throttle: LoginThrottle) -> Router {
    let credential_routes = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route_layer(from_fn_with_state(throttle, throttle_middleware));

    Router::new()
        .merge(credential_routes)
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_current_user))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .with_state(state)
}

/// Register endpoint - POST /auth/register
pub async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    for (field, value) in [
        ("name", &payload.name),
        ("email", &payload.email),
        ("username", &payload.username),
        ("password", &payload.password),
    ] {
        if value.trim().is_empty() {
            return Err(AuthApiError::MissingField(field));
        }
    }

    let sessions = state.sessions.clone();
    let response = run_blocking(move || {
        sessions.register(
            &payload.name,
            &payload.email,
            &payload.username,
            &payload.password,
        )
    })
    .await?;

    Ok(Json(response))
}

/// Login endpoint - POST /auth/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    let sessions = state.sessions.clone();
    let response = run_blocking(move || sessions.login(&payload.email, &payload.password)).await?;
    Ok(Json(response))
}

/// Refresh endpoint - POST /auth/refresh
pub async fn refresh(
    State(state): State<AuthState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<AuthResponse>, AuthApiError> {
    let sessions = state.sessions.clone();
    let response = run_blocking(move || sessions.refresh(&payload.refresh_token)).await?;
    Ok(Json(response))
}

/// Logout endpoint - POST /auth/logout
pub async fn logout(
    State(state): State<AuthState>,
    Json(payload): Json<LogoutRequest>,
) -> Response {
    let Some(refresh_token) = payload.refresh_token else {
        return (StatusCode::BAD_REQUEST, "Refresh token is required").into_response();
    };

    let sessions = state.sessions.clone();
    match run_blocking(move || sessions.logout(&refresh_token)).await {
        Ok(()) => (StatusCode::OK, "Logged out successfully").into_response(),
        Err(e) => {
            error!("Logout failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred while logging out",
            )
                .into_response()
        }
    }
}

/// Get current user info - GET /auth/me
pub async fn get_current_user(principal: Principal) -> Json<MeResponse> {
    Json(MeResponse {
        username: principal.username,
        role: principal.role,
    })
}

async fn run_blocking<T, F>(f: F) -> Result<T, AuthApiError>
where
    F: FnOnce() -> Result<T, SessionError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("Session task failed: {}", e);
            AuthApiError::InternalError
        })?
        .map_err(AuthApiError::from)
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    InvalidCredentials,
    UserAlreadyExists,
    UserNotFound,
    RefreshTokenNotFound,
    RefreshTokenExpired,
    MissingField(&'static str),
    InternalError,
}

impl From<SessionError> for AuthApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::DuplicateIdentity => AuthApiError::UserAlreadyExists,
            SessionError::InvalidCredentials => AuthApiError::InvalidCredentials,
            SessionError::UnknownUser(who) => {
                warn!("Session references unknown user {}", who);
                AuthApiError::UserNotFound
            }
            SessionError::RefreshTokenNotFound => AuthApiError::RefreshTokenNotFound,
            SessionError::RefreshTokenExpired => AuthApiError::RefreshTokenExpired,
            SessionError::Internal(e) => {
                error!("Auth internal error: {:#}", e);
                AuthApiError::InternalError
            }
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string())
            }
            AuthApiError::UserAlreadyExists => {
                (StatusCode::CONFLICT, "Email or username already exists".to_string())
            }
            AuthApiError::UserNotFound => (StatusCode::NOT_FOUND, "User not found".to_string()),
            AuthApiError::RefreshTokenNotFound => {
                (StatusCode::NOT_FOUND, "Refresh token not found".to_string())
            }
            AuthApiError::RefreshTokenExpired => {
                (StatusCode::UNAUTHORIZED, "Refresh token expired".to_string())
            }
            AuthApiError::MissingField(field) => {
                (StatusCode::BAD_REQUEST, format!("Field '{}' is required", field))
            }
            AuthApiError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        (status, message).into_response()
    }
}
