//! Comment API endpoints
//!
//! - GET /api/v1/articles/{slug}/comments - Comments, oldest first
//! - POST /api/v1/articles/{slug}/comments - Add comment
//! - PUT /api/v1/articles/{slug}/comments/{id} - Edit own comment
//! - DELETE /api/v1/articles/{slug}/comments/{id} - Delete comment

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, Viewer};
use crate::models::{CommentView, CreateCommentInput};

/// Mounted under `/articles`
pub fn public_router() -> Router<AppState> {
    Router::new().route("/{slug}/comments", get(list_comments))
}

/// Mounted under `/articles`, behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/{slug}/comments", post(add_comment))
        .route("/{slug}/comments/{id}", put(edit_comment).delete(delete_comment))
}

async fn list_comments(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    let comments = state.comment_service.list(&slug, viewer.id()).await?;
    Ok(Json(comments))
}

async fn add_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
    Json(body): Json<CreateCommentInput>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let comment = state.comment_service.add(&slug, &user.0, body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn edit_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((slug, id)): Path<(String, i64)>,
    Json(body): Json<CreateCommentInput>,
) -> Result<Json<CommentView>, ApiError> {
    let comment = state
        .comment_service
        .edit(&slug, id, &user.0, body)
        .await?;
    Ok(Json(comment))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((slug, id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(&slug, id, &user.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{bearer, create_article, register, test_server};
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_comment_lifecycle() {
        let server = test_server();
        let (_, jake) = register(&server, "jake").await;
        let (_, jane) = register(&server, "jane").await;
        create_article(&server, &jake, "Discuss", &[]).await;
        let (name, value) = bearer(&jane);

        let response = server
            .post("/api/v1/articles/discuss/comments")
            .add_header(name.clone(), value.clone())
            .json(&json!({"body": "It takes a Jacobian"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let comment: Value = response.json();
        assert_eq!(comment["author"]["username"], "jane");
        let id = comment["id"].as_i64().unwrap();

        let edited: Value = server
            .put(&format!("/api/v1/articles/discuss/comments/{}", id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"body": "It takes two Jacobians"}))
            .await
            .json();
        assert_eq!(edited["body"], "It takes two Jacobians");

        let listed: Value = server.get("/api/v1/articles/discuss/comments").await.json();
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let article: Value = server.get("/api/v1/articles/discuss").await.json();
        assert_eq!(article["comment_count"], 1);

        server
            .delete(&format!("/api/v1/articles/discuss/comments/{}", id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let listed: Value = server.get("/api/v1/articles/discuss/comments").await.json();
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comment_permissions() {
        let server = test_server();
        register(&server, "admin").await;
        let (_, jake) = register(&server, "jake").await;
        let (_, jane) = register(&server, "jane").await;
        let (_, bob) = register(&server, "bob").await;
        create_article(&server, &jake, "Mine", &[]).await;

        let (jane_h, jane_v) = bearer(&jane);
        let comment: Value = server
            .post("/api/v1/articles/mine/comments")
            .add_header(jane_h, jane_v)
            .json(&json!({"body": "first"}))
            .await
            .json();
        let path = format!("/api/v1/articles/mine/comments/{}", comment["id"]);

        // Bystanders can neither edit nor delete
        let (bob_h, bob_v) = bearer(&bob);
        server
            .put(&path)
            .add_header(bob_h.clone(), bob_v.clone())
            .json(&json!({"body": "edited"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .delete(&path)
            .add_header(bob_h, bob_v)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        // The article's author may delete, but not edit
        let (jake_h, jake_v) = bearer(&jake);
        server
            .put(&path)
            .add_header(jake_h.clone(), jake_v.clone())
            .json(&json!({"body": "edited"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .delete(&path)
            .add_header(jake_h, jake_v)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_comment_on_missing_article_or_empty_body() {
        let server = test_server();
        let (_, jake) = register(&server, "jake").await;
        create_article(&server, &jake, "Here", &[]).await;
        let (name, value) = bearer(&jake);

        server
            .post("/api/v1/articles/nowhere/comments")
            .add_header(name.clone(), value.clone())
            .json(&json!({"body": "hello"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/api/v1/articles/here/comments")
            .add_header(name.clone(), value.clone())
            .json(&json!({"body": "   "}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .delete("/api/v1/articles/here/comments/999")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
