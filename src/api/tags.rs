//! Tag API endpoints
//!
//! - GET /api/v1/tags - Every tag with its article count
//! - GET /api/v1/tags/popular - Most used tags

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::TagWithCount;

const MAX_POPULAR_LIMIT: usize = 100;

/// Query parameters for the popular tag list
#[derive(Debug, Deserialize)]
pub struct PopularTagsQuery {
    #[serde(default = "default_popular_limit")]
    pub limit: usize,
}

fn default_popular_limit() -> usize {
    10
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags))
        .route("/popular", get(popular_tags))
}

async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagWithCount>>, ApiError> {
    Ok(Json(state.tag_service.list_with_counts().await?))
}

async fn popular_tags(
    State(state): State<AppState>,
    Query(query): Query<PopularTagsQuery>,
) -> Result<Json<Vec<TagWithCount>>, ApiError> {
    let limit = query.limit.clamp(1, MAX_POPULAR_LIMIT);
    Ok(Json(state.tag_service.popular(limit).await?))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{create_article, register, test_server};
    use serde_json::Value;

    #[tokio::test]
    async fn test_tags_with_counts_and_popular() {
        let server = test_server();
        let (_, token) = register(&server, "jake").await;
        create_article(&server, &token, "One", &["rust", "web"]).await;
        create_article(&server, &token, "Two", &["rust"]).await;
        create_article(&server, &token, "Three", &["Rust", "cli"]).await;

        let all: Value = server.get("/api/v1/tags").await.json();
        let all = all.as_array().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0]["slug"], "rust");
        assert_eq!(all[0]["article_count"], 3);

        let popular: Value = server
            .get("/api/v1/tags/popular")
            .add_query_param("limit", 1)
            .await
            .json();
        let popular = popular.as_array().unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0]["name"], "rust");

        // Zero is clamped up to one
        let clamped: Value = server
            .get("/api/v1/tags/popular")
            .add_query_param("limit", 0)
            .await
            .json();
        assert_eq!(clamped.as_array().unwrap().len(), 1);
    }
}
