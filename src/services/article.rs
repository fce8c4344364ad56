//! Article service
//!
//! Business rules around articles:
//! - Validation and slug generation (numeric suffix on collision)
//! - Markdown rendering and description excerpts
//! - Permission checks for edits and deletes
//! - Tag replacement through the tag service
//! - Likes and bookmarks
//! - Caching of base article rows by slug

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{ArticleRepository, MarkRepository};
use crate::models::{
    Article, ArticleQuery, ArticleView, CreateArticleInput, ListParams, PagedResult,
    UpdateArticleInput, User,
};
use crate::services::markdown::{excerpt, MarkdownRenderer};
use crate::services::tag::{TagService, TagServiceError};
use anyhow::Context;
use std::sync::Arc;

const CACHE_KEY_ARTICLE_BY_SLUG: &str = "article:";

const MAX_TITLE_LEN: usize = 255;

/// Length of descriptions derived from the body
const EXCERPT_LEN: usize = 160;

/// Slug used when a title has no usable characters
const FALLBACK_SLUG: &str = "article";

/// Give up looking for a free `-N` suffix after this many tries
const MAX_SLUG_SUFFIX: usize = 1000;

/// Error types for article service operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    #[error("Article not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TagServiceError> for ArticleServiceError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::ValidationError(msg) => Self::ValidationError(msg),
            TagServiceError::InternalError(e) => Self::InternalError(e),
        }
    }
}

pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    likes: Arc<dyn MarkRepository>,
    bookmarks: Arc<dyn MarkRepository>,
    tags: Arc<TagService>,
    cache: Arc<MemoryCache>,
    markdown_renderer: MarkdownRenderer,
}

impl ArticleService {
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        likes: Arc<dyn MarkRepository>,
        bookmarks: Arc<dyn MarkRepository>,
        tags: Arc<TagService>,
        cache: Arc<MemoryCache>,
        markdown_renderer: MarkdownRenderer,
    ) -> Self {
        Self {
            repo,
            likes,
            bookmarks,
            tags,
            cache,
            markdown_renderer,
        }
    }

    /// Publish a new article by `author`.
    ///
    /// # Errors
    /// - `ValidationError` if title or body is blank, or a tag name is unusable
    pub async fn create(
        &self,
        author: &User,
        input: CreateArticleInput,
    ) -> Result<ArticleView, ArticleServiceError> {
        let title = validate_title(&input.title)?;
        let body = validate_body(&input.body)?;

        let base = match generate_slug(&title) {
            s if s.is_empty() => FALLBACK_SLUG.to_string(),
            s => s,
        };
        let slug = self.unique_slug(&base).await?;
        let description = match input.description.trim() {
            "" => excerpt(&body, EXCERPT_LEN),
            d => d.to_string(),
        };
        let body_html = self.markdown_renderer.render(&body);
        let tags = self.tags.resolve(&input.tags).await?;

        let article = self
            .repo
            .create(&Article::new(slug, title, description, body, body_html, author.id))
            .await
            .context("Failed to create article")?;

        if !tags.is_empty() {
            self.tags.set_article_tags(article.id, &tags).await?;
        }

        tracing::info!(article_id = article.id, slug = %article.slug, author_id = author.id, "Article created");
        self.view(&article, Some(author.id)).await
    }

    /// Article view by slug
    pub async fn get(
        &self,
        slug: &str,
        viewer: Option<i64>,
    ) -> Result<ArticleView, ArticleServiceError> {
        let article = self.require_cached(slug).await?;
        self.view(&article, viewer).await
    }

    /// One page of articles matching `query`, newest first.
    pub async fn list(
        &self,
        mut query: ArticleQuery,
        params: &ListParams,
        viewer: Option<i64>,
    ) -> Result<PagedResult<ArticleView>, ArticleServiceError> {
        query.offset = params.offset();
        query.limit = params.limit();
        let (views, total) = self
            .repo
            .list_views(&query, viewer)
            .await
            .context("Failed to list articles")?;
        Ok(PagedResult::new(views, total, params))
    }

    /// Articles written by the users `user_id` follows
    pub async fn feed(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<PagedResult<ArticleView>, ArticleServiceError> {
        self.list(ArticleQuery::default().with_feed_of(user_id), params, Some(user_id))
            .await
    }

    /// Articles `user_id` bookmarked. Bookmarks are private to their owner.
    pub async fn bookmarked(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<PagedResult<ArticleView>, ArticleServiceError> {
        self.list(
            ArticleQuery::default().with_bookmarked_by(user_id),
            params,
            Some(user_id),
        )
        .await
    }

    /// Apply a partial update.
    ///
    /// The slug only changes when one is given explicitly; retitling keeps
    /// existing links working. Tags are replaced wholesale when present.
    pub async fn update(
        &self,
        slug: &str,
        actor: &User,
        input: UpdateArticleInput,
    ) -> Result<ArticleView, ArticleServiceError> {
        let mut article = self.require(slug).await?;
        ensure_can_edit(actor, &article)?;

        if !input.has_changes() {
            return self.view(&article, Some(actor.id)).await;
        }

        let old_slug = article.slug.clone();
        if let Some(title) = input.title {
            article.title = validate_title(&title)?;
        }
        if let Some(body) = input.body {
            article.body = validate_body(&body)?;
            article.body_html = self.markdown_renderer.render(&article.body);
        }
        if let Some(description) = input.description {
            article.description = match description.trim() {
                "" => excerpt(&article.body, EXCERPT_LEN),
                d => d.to_string(),
            };
        }
        if let Some(requested) = input.slug {
            let new_slug = generate_slug(&requested);
            if new_slug.is_empty() {
                return Err(ArticleServiceError::ValidationError(format!(
                    "Slug '{}' has no usable characters",
                    requested
                )));
            }
            if new_slug != article.slug {
                if self
                    .repo
                    .exists_by_slug(&new_slug)
                    .await
                    .context("Failed to check slug uniqueness")?
                {
                    return Err(ArticleServiceError::Conflict(format!(
                        "Slug '{}' is already taken",
                        new_slug
                    )));
                }
                article.slug = new_slug;
            }
        }

        let tags = match &input.tags {
            Some(names) => Some(self.tags.resolve(names).await?),
            None => None,
        };

        let updated = self
            .repo
            .update(&article)
            .await
            .context("Failed to update article")?;
        self.invalidate(&old_slug).await;
        if updated.slug != old_slug {
            self.invalidate(&updated.slug).await;
        }

        if let Some(tags) = tags {
            self.tags.set_article_tags(updated.id, &tags).await?;
            self.tags.prune_unused().await?;
        }

        tracing::info!(article_id = updated.id, slug = %updated.slug, "Article updated");
        self.view(&updated, Some(actor.id)).await
    }

    /// Delete an article; tags left without articles go with it.
    pub async fn delete(&self, slug: &str, actor: &User) -> Result<(), ArticleServiceError> {
        let article = self.require(slug).await?;
        ensure_can_edit(actor, &article)?;

        self.repo
            .delete(article.id)
            .await
            .context("Failed to delete article")?;
        self.invalidate(&article.slug).await;
        self.tags.prune_unused().await?;

        tracing::info!(article_id = article.id, slug = %article.slug, actor_id = actor.id, "Article deleted");
        Ok(())
    }

    pub async fn like(&self, slug: &str, user_id: i64) -> Result<ArticleView, ArticleServiceError> {
        self.mark(self.likes.as_ref(), slug, user_id, true).await
    }

    pub async fn unlike(
        &self,
        slug: &str,
        user_id: i64,
    ) -> Result<ArticleView, ArticleServiceError> {
        self.mark(self.likes.as_ref(), slug, user_id, false).await
    }

    pub async fn bookmark(
        &self,
        slug: &str,
        user_id: i64,
    ) -> Result<ArticleView, ArticleServiceError> {
        self.mark(self.bookmarks.as_ref(), slug, user_id, true).await
    }

    pub async fn unbookmark(
        &self,
        slug: &str,
        user_id: i64,
    ) -> Result<ArticleView, ArticleServiceError> {
        self.mark(self.bookmarks.as_ref(), slug, user_id, false).await
    }

    pub async fn count(&self) -> Result<i64, ArticleServiceError> {
        Ok(self.repo.count().await.context("Failed to count articles")?)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn mark(
        &self,
        marks: &dyn MarkRepository,
        slug: &str,
        user_id: i64,
        set: bool,
    ) -> Result<ArticleView, ArticleServiceError> {
        let article = self.require_cached(slug).await?;
        let kind = marks.kind();
        let result = if set {
            marks.add(user_id, article.id).await
        } else {
            marks.remove(user_id, article.id).await
        };
        let changed = result.with_context(|| format!("Failed to update {}", kind.table()))?;

        if changed {
            tracing::debug!(article_id = article.id, user_id, set, "{} changed", kind.table());
        }
        self.view(&article, Some(user_id)).await
    }

    async fn view(
        &self,
        article: &Article,
        viewer: Option<i64>,
    ) -> Result<ArticleView, ArticleServiceError> {
        self.repo
            .get_view(article.id, viewer)
            .await
            .context("Failed to load article view")?
            .ok_or_else(|| ArticleServiceError::NotFound(article.slug.clone()))
    }

    /// Uncached lookup, used before writes
    async fn require(&self, slug: &str) -> Result<Article, ArticleServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get article by slug")?
            .ok_or_else(|| ArticleServiceError::NotFound(slug.to_string()))
    }

    async fn require_cached(&self, slug: &str) -> Result<Article, ArticleServiceError> {
        let key = format!("{}{}", CACHE_KEY_ARTICLE_BY_SLUG, slug);
        match self.cache.get::<Article>(&key).await {
            Ok(Some(article)) => return Ok(article),
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring unreadable cache entry {}: {:#}", key, e),
        }

        let article = self.require(slug).await?;
        if let Err(e) = self.cache.set(&key, &article, self.cache.default_ttl()).await {
            tracing::warn!("Failed to cache article {}: {:#}", slug, e);
        }
        Ok(article)
    }

    async fn invalidate(&self, slug: &str) {
        let key = format!("{}{}", CACHE_KEY_ARTICLE_BY_SLUG, slug);
        if let Err(e) = self.cache.delete(&key).await {
            tracing::warn!("Failed to invalidate article cache: {:#}", e);
        }
    }

    /// `base`, or `base-2`, `base-3`, ... whichever is free first.
    async fn unique_slug(&self, base: &str) -> Result<String, ArticleServiceError> {
        for n in 1..=MAX_SLUG_SUFFIX {
            let candidate = match n {
                1 => base.to_string(),
                n => format!("{}-{}", base, n),
            };
            if !self
                .repo
                .exists_by_slug(&candidate)
                .await
                .context("Failed to check slug uniqueness")?
            {
                return Ok(candidate);
            }
        }
        Err(ArticleServiceError::Conflict(format!(
            "No free slug for '{}'",
            base
        )))
    }
}

fn ensure_can_edit(actor: &User, article: &Article) -> Result<(), ArticleServiceError> {
    if actor.can_edit(article.author_id) {
        Ok(())
    } else {
        Err(ArticleServiceError::Forbidden(
            "Only the author or an editor can change this article".to_string(),
        ))
    }
}

fn validate_title(title: &str) -> Result<String, ArticleServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ArticleServiceError::ValidationError(
            "Article title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ArticleServiceError::ValidationError(format!(
            "Article title cannot exceed {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

fn validate_body(body: &str) -> Result<String, ArticleServiceError> {
    if body.trim().is_empty() {
        return Err(ArticleServiceError::ValidationError(
            "Article body cannot be empty".to_string(),
        ));
    }
    Ok(body.to_string())
}

/// Generate a URL-friendly slug from a title
///
/// Lowercases, keeps letters and digits (any script), turns everything else
/// into single hyphens and trims hyphens from both ends.
pub fn generate_slug(title: &str) -> String {
    let mut result = String::with_capacity(title.len());
    let mut prev_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_alphanumeric() {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !result.is_empty() {
            result.push('-');
            prev_hyphen = true;
        }
    }

    result.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Repositories;
    use crate::models::UserRole;

    struct Fixture {
        repos: Repositories,
        service: ArticleService,
    }

    impl Fixture {
        fn new() -> Self {
            let repos = Repositories::memory();
            let cache = Arc::new(MemoryCache::new());
            let tags = Arc::new(TagService::new(repos.tags.clone(), cache.clone()));
            let service = ArticleService::new(
                repos.articles.clone(),
                repos.likes.clone(),
                repos.bookmarks.clone(),
                tags,
                cache,
                MarkdownRenderer::new(),
            );
            Self { repos, service }
        }

        async fn user(&self, name: &str, role: UserRole) -> User {
            let user = User::new(
                name.to_string(),
                format!("{}@example.com", name),
                "hash".to_string(),
                role,
            );
            self.repos.users.create(&user).await.unwrap()
        }

        async fn post(&self, author: &User, title: &str, tags: &[&str]) -> ArticleView {
            self.service
                .create(
                    author,
                    CreateArticleInput {
                        title: title.to_string(),
                        description: String::new(),
                        body: format!("# {}\n\nIt takes a **Jacobian**.", title),
                        tags: tags.iter().map(|t| t.to_string()).collect(),
                    },
                )
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_create_renders_and_derives() {
        let fx = Fixture::new();
        let jake = fx.user("jake", UserRole::Author).await;

        let view = fx.post(&jake, "How to train your dragon", &["dragons", "Training"]).await;

        assert_eq!(view.slug, "how-to-train-your-dragon");
        assert!(view.body_html.contains("<strong>Jacobian</strong>"));
        assert_eq!(view.description, "How to train your dragon It takes a Jacobian.");
        assert_eq!(view.tags, vec!["Training", "dragons"]);
        assert_eq!(view.author.username, "jake");
        assert_eq!(view.like_count, 0);
    }

    #[tokio::test]
    async fn test_create_validates() {
        let fx = Fixture::new();
        let jake = fx.user("jake", UserRole::Author).await;

        let blank_title = CreateArticleInput {
            title: "  ".to_string(),
            body: "body".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            fx.service.create(&jake, blank_title).await,
            Err(ArticleServiceError::ValidationError(_))
        ));

        let blank_body = CreateArticleInput {
            title: "Title".to_string(),
            body: "\n\n".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            fx.service.create(&jake, blank_body).await,
            Err(ArticleServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_create_with_bad_tag_stores_nothing() {
        let fx = Fixture::new();
        let jake = fx.user("jake", UserRole::Author).await;

        let input = CreateArticleInput {
            title: "Hello".to_string(),
            body: "World".to_string(),
            tags: vec!["fine".to_string(), "!!!".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            fx.service.create(&jake, input).await,
            Err(ArticleServiceError::ValidationError(_))
        ));
        assert_eq!(fx.service.count().await.unwrap(), 0);
        assert!(fx.repos.tags.list().await.unwrap().is_empty());

        // A corrected retry gets the unsuffixed slug
        assert_eq!(fx.post(&jake, "Hello", &["fine"]).await.slug, "hello");
    }

    #[tokio::test]
    async fn test_failed_update_leaves_article_and_cache_intact() {
        let fx = Fixture::new();
        let jake = fx.user("jake", UserRole::Author).await;
        fx.post(&jake, "Orig", &["keep"]).await;
        // Warm the slug cache
        fx.service.get("orig", None).await.unwrap();

        let rejected = fx
            .service
            .update(
                "orig",
                &jake,
                UpdateArticleInput {
                    title: Some("New".to_string()),
                    slug: Some("moved".to_string()),
                    tags: Some(vec!["!!!".to_string()]),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(rejected, Err(ArticleServiceError::ValidationError(_))));

        let stored = fx.repos.articles.get_by_slug("orig").await.unwrap().unwrap();
        assert_eq!(stored.title, "Orig");
        assert!(fx.repos.articles.get_by_slug("moved").await.unwrap().is_none());
        let view = fx.service.get("orig", None).await.unwrap();
        assert_eq!(view.tags, vec!["keep"]);

        fx.service
            .update(
                "orig",
                &jake,
                UpdateArticleInput {
                    slug: Some("moved".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            fx.service.get("orig", None).await,
            Err(ArticleServiceError::NotFound(_))
        ));
        assert_eq!(fx.service.get("moved", None).await.unwrap().title, "Orig");
    }

    #[tokio::test]
    async fn test_slug_collisions_get_suffix() {
        let fx = Fixture::new();
        let jake = fx.user("jake", UserRole::Author).await;

        assert_eq!(fx.post(&jake, "Same title", &[]).await.slug, "same-title");
        assert_eq!(fx.post(&jake, "Same Title!", &[]).await.slug, "same-title-2");
        assert_eq!(fx.post(&jake, "same  title", &[]).await.slug, "same-title-3");
        assert_eq!(fx.post(&jake, "???", &[]).await.slug, "article");
    }

    #[tokio::test]
    async fn test_update_keeps_slug_unless_given() {
        let fx = Fixture::new();
        let jake = fx.user("jake", UserRole::Author).await;
        fx.post(&jake, "Taken", &[]).await;
        let view = fx.post(&jake, "Original", &["old"]).await;

        let retitled = fx
            .service
            .update(
                &view.slug,
                &jake,
                UpdateArticleInput {
                    title: Some("Renamed".to_string()),
                    body: Some("New *body*".to_string()),
                    tags: Some(vec!["new".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(retitled.slug, "original");
        assert_eq!(retitled.title, "Renamed");
        assert!(retitled.body_html.contains("<em>body</em>"));
        assert_eq!(retitled.tags, vec!["new"]);
        // "old" lost its only article
        assert!(fx.repos.tags.get_by_name("old").await.unwrap().is_none());

        let conflict = fx
            .service
            .update(
                "original",
                &jake,
                UpdateArticleInput {
                    slug: Some("taken".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(conflict, Err(ArticleServiceError::Conflict(_))));

        let moved = fx
            .service
            .update(
                "original",
                &jake,
                UpdateArticleInput {
                    slug: Some("Fresh Start".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.slug, "fresh-start");
        assert!(matches!(
            fx.service.get("original", None).await,
            Err(ArticleServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_permissions() {
        let fx = Fixture::new();
        let jake = fx.user("jake", UserRole::Author).await;
        let other = fx.user("other", UserRole::Author).await;
        let editor = fx.user("editor", UserRole::Editor).await;
        let view = fx.post(&jake, "Mine", &["solo"]).await;

        let edit = UpdateArticleInput {
            title: Some("Hijacked".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            fx.service.update(&view.slug, &other, edit.clone()).await,
            Err(ArticleServiceError::Forbidden(_))
        ));
        assert!(matches!(
            fx.service.delete(&view.slug, &other).await,
            Err(ArticleServiceError::Forbidden(_))
        ));

        fx.service.update(&view.slug, &editor, edit).await.unwrap();
        fx.service.delete(&view.slug, &editor).await.unwrap();
        assert!(fx.repos.tags.get_by_name("solo").await.unwrap().is_none());
        assert_eq!(fx.service.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_like_and_bookmark() {
        let fx = Fixture::new();
        let jake = fx.user("jake", UserRole::Author).await;
        let fan = fx.user("fan", UserRole::Author).await;
        let view = fx.post(&jake, "Likeable", &[]).await;

        let liked = fx.service.like(&view.slug, fan.id).await.unwrap();
        assert!(liked.liked);
        assert_eq!(liked.like_count, 1);
        let again = fx.service.like(&view.slug, fan.id).await.unwrap();
        assert_eq!(again.like_count, 1);

        let kept = fx.service.bookmark(&view.slug, fan.id).await.unwrap();
        assert!(kept.bookmarked);
        assert!(kept.liked);

        let anonymous = fx.service.get(&view.slug, None).await.unwrap();
        assert!(!anonymous.liked);
        assert_eq!(anonymous.bookmark_count, 1);

        let page = fx.service.bookmarked(fan.id, &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert!(fx
            .service
            .bookmarked(jake.id, &ListParams::default())
            .await
            .unwrap()
            .items
            .is_empty());

        let unliked = fx.service.unlike(&view.slug, fan.id).await.unwrap();
        assert_eq!(unliked.like_count, 0);
        let unkept = fx.service.unbookmark(&view.slug, fan.id).await.unwrap();
        assert!(!unkept.bookmarked);

        assert!(matches!(
            fx.service.like("missing", fan.id).await,
            Err(ArticleServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_and_feed() {
        let fx = Fixture::new();
        let jake = fx.user("jake", UserRole::Author).await;
        let celeb = fx.user("celeb", UserRole::Author).await;
        fx.post(&jake, "Jake one", &["rust"]).await;
        fx.post(&celeb, "Celeb one", &["rust"]).await;
        fx.post(&celeb, "Celeb two", &["web"]).await;

        let all = fx
            .service
            .list(ArticleQuery::default(), &ListParams::new(1, 2), None)
            .await
            .unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.items.len(), 2);
        assert_eq!(all.items[0].slug, "celeb-two");
        assert!(all.has_next());

        let rust = fx
            .service
            .list(ArticleQuery::default().with_tag("rust"), &ListParams::default(), None)
            .await
            .unwrap();
        assert_eq!(rust.total, 2);

        assert_eq!(fx.service.feed(jake.id, &ListParams::default()).await.unwrap().total, 0);
        fx.repos.follows.follow(jake.id, celeb.id).await.unwrap();
        let feed = fx.service.feed(jake.id, &ListParams::default()).await.unwrap();
        assert_eq!(feed.total, 2);
        assert!(feed.items.iter().all(|a| a.author.following));
    }

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("How to Train Your Dragon"), "how-to-train-your-dragon");
        assert_eq!(generate_slug("Hello, World!"), "hello-world");
        assert_eq!(generate_slug("  --Rust__2024-- "), "rust-2024");
        assert_eq!(generate_slug("日本語 タイトル"), "日本語-タイトル");
        assert_eq!(generate_slug("!!!"), "");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn slug_is_clean(title in "\\PC{0,40}") {
                let slug = generate_slug(&title);
                prop_assert!(!slug.starts_with('-'));
                prop_assert!(!slug.ends_with('-'));
                prop_assert!(!slug.contains("--"));
                prop_assert!(slug.chars().all(|c| c == '-' || !c.is_ascii_punctuation()));
                prop_assert!(!slug.chars().any(char::is_whitespace));
            }

            #[test]
            fn slug_is_idempotent(title in "[a-zA-Z0-9 ,.!?_-]{0,40}") {
                let slug = generate_slug(&title);
                prop_assert_eq!(generate_slug(&slug), slug.clone());
            }
        }
    }
}
