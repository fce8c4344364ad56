//! Article model
//!
//! This module provides:
//! - `Article`, the stored row
//! - `ArticleView`, the denormalized read model returned by the API
//! - `ArticleQuery`, the filter set understood by every storage backend
//! - Input and pagination types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Profile;

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    /// URL-friendly slug, unique
    pub slug: String,
    pub title: String,
    /// Short summary shown in lists
    pub description: String,
    /// Markdown source
    pub body: String,
    /// Rendered HTML
    pub body_html: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn new(
        slug: String,
        title: String,
        description: String,
        body: String,
        body_html: String,
        author_id: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the store
            slug,
            title,
            description,
            body,
            body_html,
            author_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Article joined with its author, tags, counters and viewer state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleView {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub body_html: String,
    /// Tag names, sorted
    pub tags: Vec<String>,
    pub author: Profile,
    pub like_count: i64,
    pub comment_count: i64,
    pub bookmark_count: i64,
    /// Viewer liked this article
    pub liked: bool,
    /// Viewer bookmarked this article
    pub bookmarked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters for article listings. All set filters must match.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    /// Tag slug or name
    pub tag: Option<String>,
    /// Author username
    pub author: Option<String>,
    /// Username of a user who liked the article
    pub liked_by: Option<String>,
    /// Id of a user who bookmarked the article
    pub bookmarked_by: Option<i64>,
    /// Id of a user whose followees wrote the article
    pub feed_of: Option<i64>,
    /// Substring of title or description, ignoring ASCII case
    pub search: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

impl ArticleQuery {
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_liked_by(mut self, username: impl Into<String>) -> Self {
        self.liked_by = Some(username.into());
        self
    }

    pub fn with_bookmarked_by(mut self, user_id: i64) -> Self {
        self.bookmarked_by = Some(user_id);
        self
    }

    pub fn with_feed_of(mut self, user_id: i64) -> Self {
        self.feed_of = Some(user_id);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Search term folded to ASCII lowercase, if any non-blank one is set.
    ///
    /// Non-ASCII letters keep their case, matching SQLite's `LOWER`.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_lowercase)
    }
}

/// Input for creating a new article
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateArticleInput {
    pub title: String,
    /// Derived from the body when empty
    #[serde(default)]
    pub description: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; unset fields keep their value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateArticleInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    /// New slug, checked for uniqueness
    pub slug: Option<String>,
    /// Replaces the whole tag set when present
    pub tags: Option<Vec<String>>,
}

impl UpdateArticleInput {
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.body.is_some()
            || self.slug.is_some()
            || self.tags.is_some()
    }
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    /// 1-indexed
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Clamps page to >= 1 and per_page to 1..=100
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        let per_page = self.per_page as i64;
        ((self.total + per_page - 1) / per_page) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_list_params_clamps() {
        let params = ListParams::new(0, 1000);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);

        let params = ListParams::new(3, 0);
        assert_eq!(params.per_page, 1);
        assert_eq!(params.offset(), 2);
    }

    #[test]
    fn test_search_term_normalized() {
        let query = ArticleQuery::default().with_search("  Dragons ");
        assert_eq!(query.search_term().as_deref(), Some("dragons"));

        let query = ArticleQuery::default().with_search("   ");
        assert!(query.search_term().is_none());
    }

    #[test]
    fn test_update_input_has_changes() {
        assert!(!UpdateArticleInput::default().has_changes());
        let input = UpdateArticleInput {
            tags: Some(vec![]),
            ..Default::default()
        };
        assert!(input.has_changes());
    }

    proptest! {
        #[test]
        fn paging_covers_every_item(total in 0i64..5000, page in 0u32..200, per_page in 0u32..300) {
            let params = ListParams::new(page, per_page);
            let result: PagedResult<()> = PagedResult::new(vec![], total, &params);
            let pages = result.total_pages() as i64;

            prop_assert!(params.per_page >= 1 && params.per_page <= 100);
            prop_assert!(pages * params.per_page as i64 >= total);
            prop_assert!((pages - 1).max(0) * (params.per_page as i64) < total.max(1));
            prop_assert_eq!(params.offset(), (params.page as i64 - 1) * params.per_page as i64);
        }
    }
}
