//! API layer - HTTP handlers and routing
//!
//! Everything is served under `/api/v1`:
//! - Auth endpoints (register, login, session management)
//! - Profile and follow endpoints
//! - Article, like, bookmark and comment endpoints
//! - Tag endpoints
//! - Health check

pub mod articles;
pub mod auth;
pub mod comments;
pub mod common;
pub mod middleware;
pub mod profiles;
pub mod responses;
pub mod tags;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::DatabaseDriver;

pub use middleware::{ApiError, AppState, RequestStats};

/// Build the `/api/v1` router
///
/// Routes are grouped by how they treat the session token: required,
/// optional (viewer-dependent fields), or ignored.
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/profiles", profiles::protected_router())
        .nest(
            "/articles",
            articles::protected_router().merge(comments::protected_router()),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let viewer_routes = Router::new()
        .nest("/profiles", profiles::public_router())
        .nest(
            "/articles",
            articles::public_router().merge(comments::public_router()),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::public_router())
        .nest("/tags", tags::router())
        .merge(viewer_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors_layer(cors_origin)),
        )
        // Outermost, so it times every request
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}

/// `*` allows any origin without credentials; a concrete origin also
/// allows the session cookie.
fn cors_layer(origin: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    if origin.trim() == "*" {
        return base.allow_origin(Any);
    }
    match HeaderValue::from_str(origin.trim()) {
        Ok(value) => base.allow_origin(value).allow_credentials(true),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
            base
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    storage: DatabaseDriver,
    total_requests: u64,
    avg_response_time_us: f64,
    uptime_seconds: u64,
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (storage, healthy) = match &state.pool {
        Some(pool) => match pool.ping().await {
            Ok(()) => (pool.driver(), true),
            Err(e) => {
                tracing::error!("Health check failed: {:#}", e);
                (pool.driver(), false)
            }
        },
        None => (DatabaseDriver::Memory, true),
    };

    let stats = &state.request_stats;
    let body = HealthResponse {
        status: if healthy { "ok" } else { "unavailable" },
        storage,
        total_requests: stats.total_requests(),
        avg_response_time_us: stats.avg_response_time_us(),
        uptime_seconds: stats.uptime_seconds(),
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// Shared fixtures for the router tests of each endpoint module
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::Repositories;
    use axum::http::HeaderName;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;

    pub fn test_state() -> AppState {
        AppState::new(
            Repositories::memory(),
            None,
            Arc::new(MemoryCache::new()),
            7,
        )
    }

    pub fn test_server() -> TestServer {
        TestServer::new(build_router(test_state(), "*")).unwrap()
    }

    /// Register `username` with `<username>@example.com` / `password1`;
    /// returns the user JSON and the session token.
    pub async fn register(server: &TestServer, username: &str) -> (Value, String) {
        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": "password1",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        let token = body["token"].as_str().unwrap().to_string();
        (body["user"].clone(), token)
    }

    pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
        (
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        )
    }

    pub async fn create_article(
        server: &TestServer,
        token: &str,
        title: &str,
        tags: &[&str],
    ) -> Value {
        let (name, value) = bearer(token);
        let response = server
            .post("/api/v1/articles")
            .add_header(name, value)
            .json(&json!({
                "title": title,
                "body": format!("Some thoughts about {}.", title),
                "tags": tags,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::Repositories;
    use crate::models::UserStatus;
    use axum_test::TestServer;
    use serde_json::Value;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_reports_memory_storage() {
        let server = test_server();
        server.get("/api/v1/tags").await.assert_status_ok();

        let response = server.get("/api/v1/health").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["storage"], "memory");
        assert!(body["total_requests"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_unknown_article_uses_error_envelope() {
        let server = test_server();
        let response = server.get("/api/v1/articles/nope").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert!(body["error"]["message"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_banned_user_is_rejected() {
        let repos = Repositories::memory();
        let users = repos.users.clone();
        let state = AppState::new(repos, None, Arc::new(MemoryCache::new()), 7);
        let server = TestServer::new(build_router(state, "*")).unwrap();
        register(&server, "admin").await;
        let (user, token) = register(&server, "troll").await;

        let id = user["id"].as_i64().unwrap();
        let mut troll = users.get_by_id(id).await.unwrap().unwrap();
        troll.status = UserStatus::Banned;
        users.update(&troll).await.unwrap();

        let (name, value) = bearer(&token);
        let response = server.get("/api/v1/auth/me").add_header(name, value).await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "USER_BANNED");

        server
            .post("/api/v1/auth/login")
            .json(&serde_json::json!({"username_or_email": "troll", "password": "password1"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_cors_layer_accepts_any_origin_string() {
        let _ = cors_layer("*");
        let _ = cors_layer("http://localhost:3000");
        let _ = cors_layer("bad\norigin");
    }
}
