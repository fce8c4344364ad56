//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Register and sign in
//! - POST /api/v1/auth/login - Sign in by username or email
//! - POST /api/v1/auth/logout - Revoke the current session
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/profile - Edit own account
//! - PUT /api/v1/auth/password - Change password

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::api::middleware::{
    clear_session_cookie, extract_session_token, session_cookie, ApiError, AppState,
    AuthenticatedUser,
};
use crate::api::responses::UserResponse;
use crate::models::{CreateUserInput, Session, UpdateUserInput};
use crate::services::{LoginInput, UserServiceError};

const IP_RETRY_AFTER_SECS: u64 = 60;
const USERNAME_RETRY_AFTER_SECS: u64 = 15 * 60;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Response for successful authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

/// Routes open to anonymous callers
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .user_service
        .register(CreateUserInput {
            username: body.username,
            email: body.email,
            password: body.password,
        })
        .await?;
    let session = state.user_service.start_session(user.id).await?;

    Ok((
        StatusCode::CREATED,
        cookie_headers(&state, &session)?,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/login
///
/// Rate limited per client IP and per account. Failures count against the
/// account whether it was named by username or email; a success clears it.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identifier = body.username_or_email.trim().to_string();

    if let Some(ip) = client_ip(&headers) {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!(%ip, "Login rate limit hit for IP");
            return Err(ApiError::rate_limited(
                "Too many requests, try again later",
                IP_RETRY_AFTER_SECS,
            ));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    let key = state.user_service.login_key(&identifier).await?;
    if state.rate_limiter.is_username_limited(&key).await {
        tracing::warn!(account = %key, "Login rate limit hit for account");
        return Err(ApiError::rate_limited(
            "Too many failed attempts, try again in 15 minutes",
            USERNAME_RETRY_AFTER_SECS,
        ));
    }

    let result = state
        .user_service
        .login(LoginInput {
            username_or_email: identifier,
            password: body.password,
        })
        .await;

    let (user, session) = match result {
        Ok(ok) => ok,
        Err(e) => {
            if matches!(e, UserServiceError::AuthenticationError(_)) {
                state.rate_limiter.record_failed_attempt(&key).await;
            }
            return Err(e.into());
        }
    };

    state.rate_limiter.clear_username_attempts(&key).await;
    tracing::info!(user_id = user.id, "User logged in");

    Ok((
        cookie_headers(&state, &session)?,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    state.user_service.logout(&token).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&clear_session_cookie()).map_err(ApiError::internal)?,
    );
    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// GET /api/v1/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

/// PUT /api/v1/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateUserInput>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state.user_service.update_profile(user.0.id, body).await?;
    Ok(Json(updated.into()))
}

/// PUT /api/v1/auth/password
///
/// Other sessions of the user are revoked; the calling one survives.
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let current = extract_session_token(&headers);
    state
        .user_service
        .change_password(
            user.0.id,
            &body.current_password,
            &body.new_password,
            current.as_deref(),
        )
        .await
        .map_err(|e| match e {
            // Wrong current password is a bad request, not a dead session
            UserServiceError::AuthenticationError(msg) => ApiError::validation_error(msg),
            other => other.into(),
        })?;
    Ok(StatusCode::NO_CONTENT)
}

fn cookie_headers(state: &AppState, session: &Session) -> Result<HeaderMap, ApiError> {
    let max_age = state.user_service.session_expiration_days() * 24 * 60 * 60;
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&session_cookie(&session.id, max_age)).map_err(ApiError::internal)?,
    );
    Ok(headers)
}

/// First address in X-Forwarded-For, else X-Real-IP
fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next());
    let real = headers.get("x-real-ip").and_then(|h| h.to_str().ok());

    forwarded
        .or(real)
        .and_then(|ip| ip.trim().parse().ok())
}
