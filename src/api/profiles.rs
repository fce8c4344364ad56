//! Profile API endpoints
//!
//! - GET /api/v1/profiles/{username} - Public profile
//! - POST/DELETE /api/v1/profiles/{username}/follow - Follow / unfollow
//! - GET /api/v1/profiles/{username}/followers - Who follows the user
//! - GET /api/v1/profiles/{username}/following - Who the user follows

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, Viewer};
use crate::api::responses::PaginatedResponse;
use crate::models::Profile;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/{username}", get(get_profile))
        .route("/{username}/followers", get(followers))
        .route("/{username}/following", get(following))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/{username}/follow", post(follow).delete(unfollow))
}

async fn get_profile(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(username): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .profile_service
        .get_profile(&username, viewer.id())
        .await?;
    Ok(Json(profile))
}

async fn follow(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(username): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(
        state.profile_service.follow(user.0.id, &username).await?,
    ))
}

async fn unfollow(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(username): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(
        state.profile_service.unfollow(user.0.id, &username).await?,
    ))
}

async fn followers(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<Profile>>, ApiError> {
    let page = state
        .profile_service
        .followers(&username, &pagination.params(), viewer.id())
        .await?;
    Ok(Json(page.into()))
}

async fn following(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<Profile>>, ApiError> {
    let page = state
        .profile_service
        .following(&username, &pagination.params(), viewer.id())
        .await?;
    Ok(Json(page.into()))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{bearer, register, test_server};
    use axum::http::StatusCode;
    use serde_json::Value;

    #[tokio::test]
    async fn test_profile_view_depends_on_viewer() {
        let server = test_server();
        register(&server, "jake").await;
        let (_, jane) = register(&server, "jane").await;

        let anonymous: Value = server.get("/api/v1/profiles/jake").await.json();
        assert_eq!(anonymous["username"], "jake");
        assert_eq!(anonymous["following"], false);
        assert!(anonymous.get("email").is_none());

        let (name, value) = bearer(&jane);
        let followed: Value = server
            .post("/api/v1/profiles/jake/follow")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(followed["following"], true);
        assert_eq!(followed["follower_count"], 1);

        let seen: Value = server
            .get("/api/v1/profiles/jake")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(seen["following"], true);

        // A bad token on an optional route reads as anonymous
        let (bad_name, bad_value) = bearer("not-a-session");
        let anonymous: Value = server
            .get("/api/v1/profiles/jake")
            .add_header(bad_name, bad_value)
            .await
            .json();
        assert_eq!(anonymous["following"], false);

        let unfollowed: Value = server
            .delete("/api/v1/profiles/jake/follow")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(unfollowed["following"], false);
        assert_eq!(unfollowed["follower_count"], 0);
    }

    #[tokio::test]
    async fn test_follow_errors() {
        let server = test_server();
        let (_, jake) = register(&server, "jake").await;
        let (name, value) = bearer(&jake);

        server
            .post("/api/v1/profiles/jake/follow")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post("/api/v1/profiles/nobody/follow")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/api/v1/profiles/jake/follow")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_followers_and_following_pages() {
        let server = test_server();
        register(&server, "jake").await;
        for follower in ["jane", "bob", "alice"] {
            let (_, token) = register(&server, follower).await;
            let (name, value) = bearer(&token);
            server
                .post("/api/v1/profiles/jake/follow")
                .add_header(name, value)
                .await
                .assert_status_ok();
        }

        let page: Value = server
            .get("/api/v1/profiles/jake/followers")
            .add_query_param("page_size", 2)
            .await
            .json();
        assert_eq!(page["total"], 3);
        assert_eq!(page["items"].as_array().unwrap().len(), 2);
        assert_eq!(page["total_pages"], 2);

        let following: Value = server
            .get("/api/v1/profiles/jane/following")
            .await
            .json();
        assert_eq!(following["total"], 1);
        assert_eq!(following["items"][0]["username"], "jake");
    }
}
