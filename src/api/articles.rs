//! Article API endpoints
//!
//! - GET /api/v1/articles - List articles (tag, author, liked_by, search)
//! - GET /api/v1/articles/feed - Articles by followed authors
//! - GET /api/v1/articles/bookmarks - Caller's bookmarks
//! - POST /api/v1/articles - Create article
//! - GET /api/v1/articles/{slug} - Article by slug
//! - PUT /api/v1/articles/{slug} - Update article
//! - DELETE /api/v1/articles/{slug} - Delete article
//! - POST/DELETE /api/v1/articles/{slug}/like - Like / unlike
//! - POST/DELETE /api/v1/articles/{slug}/bookmark - Bookmark / unbookmark

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_page_size, non_blank, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, Viewer};
use crate::api::responses::PaginatedResponse;
use crate::models::{ArticleQuery, ArticleView, CreateArticleInput, UpdateArticleInput};

/// Query parameters for listing articles
#[derive(Debug, Deserialize)]
pub struct ListArticlesQuery {
    /// Tag slug or name
    pub tag: Option<String>,
    /// Author username
    pub author: Option<String>,
    /// Username whose likes to list
    pub liked_by: Option<String>,
    /// Substring of title or description, ignoring ASCII case
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl ListArticlesQuery {
    fn into_parts(self) -> (ArticleQuery, PaginationQuery) {
        let mut query = ArticleQuery::default();
        if let Some(tag) = non_blank(self.tag) {
            query = query.with_tag(tag);
        }
        if let Some(author) = non_blank(self.author) {
            query = query.with_author(author);
        }
        if let Some(liked_by) = non_blank(self.liked_by) {
            query = query.with_liked_by(liked_by);
        }
        if let Some(search) = non_blank(self.search) {
            query = query.with_search(search);
        }
        let pagination = PaginationQuery {
            page: self.page,
            page_size: self.page_size,
        };
        (query, pagination)
    }
}

/// Routes where the caller may be anonymous
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles))
        .route("/{slug}", get(get_article))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_article))
        .route("/feed", get(feed))
        .route("/bookmarks", get(bookmarks))
        .route("/{slug}", axum::routing::put(update_article).delete(delete_article))
        .route("/{slug}/like", post(like).delete(unlike))
        .route("/{slug}/bookmark", post(bookmark).delete(unbookmark))
}

/// GET /api/v1/articles
async fn list_articles(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<ListArticlesQuery>,
) -> Result<Json<PaginatedResponse<ArticleView>>, ApiError> {
    let (query, pagination) = query.into_parts();
    let page = state
        .article_service
        .list(query, &pagination.params(), viewer.id())
        .await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/articles/feed
async fn feed(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<ArticleView>>, ApiError> {
    let page = state
        .article_service
        .feed(user.0.id, &pagination.params())
        .await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/articles/bookmarks
async fn bookmarks(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<ArticleView>>, ApiError> {
    let page = state
        .article_service
        .bookmarked(user.0.id, &pagination.params())
        .await?;
    Ok(Json(page.into()))
}

/// POST /api/v1/articles
async fn create_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateArticleInput>,
) -> Result<(StatusCode, Json<ArticleView>), ApiError> {
    let article = state.article_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

/// GET /api/v1/articles/{slug}
async fn get_article(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
) -> Result<Json<ArticleView>, ApiError> {
    let article = state.article_service.get(&slug, viewer.id()).await?;
    Ok(Json(article))
}

/// PUT /api/v1/articles/{slug}
async fn update_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
    Json(body): Json<UpdateArticleInput>,
) -> Result<Json<ArticleView>, ApiError> {
    let article = state.article_service.update(&slug, &user.0, body).await?;
    Ok(Json(article))
}

/// DELETE /api/v1/articles/{slug}
async fn delete_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.article_service.delete(&slug, &user.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn like(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Json<ArticleView>, ApiError> {
    Ok(Json(state.article_service.like(&slug, user.0.id).await?))
}

async fn unlike(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Json<ArticleView>, ApiError> {
    Ok(Json(state.article_service.unlike(&slug, user.0.id).await?))
}

async fn bookmark(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Json<ArticleView>, ApiError> {
    Ok(Json(state.article_service.bookmark(&slug, user.0.id).await?))
}

async fn unbookmark(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Json<ArticleView>, ApiError> {
    Ok(Json(
        state.article_service.unbookmark(&slug, user.0.id).await?,
    ))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{bearer, create_article, register, test_server};
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_create_and_get_article() {
        let server = test_server();
        let (_, token) = register(&server, "jake").await;

        let created = create_article(&server, &token, "How to train your dragon", &["dragons", "training"]).await;
        assert_eq!(created["slug"], "how-to-train-your-dragon");
        assert_eq!(created["tags"], json!(["dragons", "training"]));
        assert_eq!(created["author"]["username"], "jake");
        assert!(created["body_html"].as_str().unwrap().contains("<p>"));

        let fetched: Value = server
            .get("/api/v1/articles/how-to-train-your-dragon")
            .await
            .json();
        assert_eq!(fetched["title"], "How to train your dragon");
        assert_eq!(fetched["liked"], false);

        // Same title again gets a numbered slug
        let again = create_article(&server, &token, "How to train your dragon", &[]).await;
        assert_eq!(again["slug"], "how-to-train-your-dragon-2");
    }

    #[tokio::test]
    async fn test_create_requires_auth_and_validates() {
        let server = test_server();
        let response = server
            .post("/api/v1/articles")
            .json(&json!({"title": "t", "body": "b"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let (_, token) = register(&server, "jake").await;
        let (name, value) = bearer(&token);
        server
            .post("/api/v1/articles")
            .add_header(name, value)
            .json(&json!({"title": "   ", "body": "b"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let server = test_server();
        let (_, jake) = register(&server, "jake").await;
        let (_, jane) = register(&server, "jane").await;
        create_article(&server, &jake, "Rust ownership", &["rust"]).await;
        create_article(&server, &jake, "Async Rust", &["rust", "async"]).await;
        create_article(&server, &jane, "Gardening", &["plants"]).await;

        let all: Value = server.get("/api/v1/articles").await.json();
        assert_eq!(all["total"], 3);
        // Newest first
        assert_eq!(all["items"][0]["title"], "Gardening");

        let by_tag: Value = server
            .get("/api/v1/articles")
            .add_query_param("tag", "rust")
            .await
            .json();
        assert_eq!(by_tag["total"], 2);

        let by_author: Value = server
            .get("/api/v1/articles")
            .add_query_param("author", "jane")
            .await
            .json();
        assert_eq!(by_author["total"], 1);

        let searched: Value = server
            .get("/api/v1/articles")
            .add_query_param("search", "ASYNC")
            .await
            .json();
        assert_eq!(searched["total"], 1);

        let paged: Value = server
            .get("/api/v1/articles")
            .add_query_param("page", 2)
            .add_query_param("page_size", 2)
            .await
            .json();
        assert_eq!(paged["items"].as_array().unwrap().len(), 1);
        assert_eq!(paged["total_pages"], 2);
    }

    #[tokio::test]
    async fn test_update_and_delete_permissions() {
        let server = test_server();
        let (_, admin) = register(&server, "admin").await;
        let (_, jake) = register(&server, "jake").await;
        let (_, jane) = register(&server, "jane").await;
        create_article(&server, &jake, "Original", &["old"]).await;

        let (name, value) = bearer(&jane);
        let response = server
            .put("/api/v1/articles/original")
            .add_header(name.clone(), value.clone())
            .json(&json!({"title": "Hijacked"}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let (name, value) = bearer(&jake);
        let updated: Value = server
            .put("/api/v1/articles/original")
            .add_header(name.clone(), value.clone())
            .json(&json!({"title": "Renamed", "body": "# New", "tags": ["new"]}))
            .await
            .json();
        assert_eq!(updated["slug"], "original");
        assert_eq!(updated["title"], "Renamed");
        assert_eq!(updated["tags"], json!(["new"]));
        assert!(updated["body_html"].as_str().unwrap().contains("<h1>"));

        // Replaced tag was pruned
        let tags: Value = server.get("/api/v1/tags").await.json();
        assert_eq!(tags.as_array().unwrap().len(), 1);

        // Admins may delete any article
        let (name, value) = bearer(&admin);
        server
            .delete("/api/v1/articles/original")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get("/api/v1/articles/original")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_like_and_bookmark() {
        let server = test_server();
        let (_, jake) = register(&server, "jake").await;
        let (_, jane) = register(&server, "jane").await;
        create_article(&server, &jake, "Likeable", &[]).await;
        let (name, value) = bearer(&jane);

        let liked: Value = server
            .post("/api/v1/articles/likeable/like")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(liked["liked"], true);
        assert_eq!(liked["like_count"], 1);

        // Liking twice does not double count
        let again: Value = server
            .post("/api/v1/articles/likeable/like")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(again["like_count"], 1);

        let liked_by: Value = server
            .get("/api/v1/articles")
            .add_query_param("liked_by", "jane")
            .await
            .json();
        assert_eq!(liked_by["total"], 1);

        let bookmarked: Value = server
            .post("/api/v1/articles/likeable/bookmark")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(bookmarked["bookmarked"], true);

        let mine: Value = server
            .get("/api/v1/articles/bookmarks")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(mine["total"], 1);
        assert_eq!(mine["items"][0]["bookmarked"], true);

        let unliked: Value = server
            .delete("/api/v1/articles/likeable/like")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(unliked["liked"], false);
        assert_eq!(unliked["like_count"], 0);

        server
            .post("/api/v1/articles/missing/like")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_feed_lists_followed_authors() {
        let server = test_server();
        let (_, jake) = register(&server, "jake").await;
        let (_, jane) = register(&server, "jane").await;
        let (_, bob) = register(&server, "bob").await;
        create_article(&server, &jake, "From jake", &[]).await;
        create_article(&server, &bob, "From bob", &[]).await;

        let (name, value) = bearer(&jane);
        server
            .post("/api/v1/profiles/jake/follow")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_ok();

        let feed: Value = server
            .get("/api/v1/articles/feed")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(feed["total"], 1);
        assert_eq!(feed["items"][0]["title"], "From jake");
        assert_eq!(feed["items"][0]["author"]["following"], true);

        server
            .get("/api/v1/articles/feed")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
