//! Article repository
//!
//! Plain article rows plus the aggregated [`ArticleView`] read model.
//!
//! A view joins the article with its author profile, counts likes,
//! comments and bookmarks with correlated sub-selects and resolves the
//! viewer's like/bookmark/follow state. Tags for a whole page are fetched
//! in one extra query.

use crate::db::pool::Backend;
use crate::db::DynDatabasePool;
use crate::models::{Article, ArticleQuery, ArticleView};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

use super::views::{
    author_profile_mysql, author_profile_sqlite, like_pattern, placeholders,
    AUTHOR_PROFILE_COLUMNS,
};

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn create(&self, article: &Article) -> Result<Article>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    /// Persist slug, title, description, body and body_html; bumps updated_at
    async fn update(&self, article: &Article) -> Result<Article>;

    /// Delete an article with its tag links, comments, likes and bookmarks
    async fn delete(&self, id: i64) -> Result<()>;

    async fn count(&self) -> Result<i64>;

    /// One page of views matching `query`, newest first, plus the total
    /// number of matches.
    async fn list_views(
        &self,
        query: &ArticleQuery,
        viewer: Option<i64>,
    ) -> Result<(Vec<ArticleView>, i64)>;

    async fn get_view(&self, id: i64, viewer: Option<i64>) -> Result<Option<ArticleView>>;
}

/// SQLx-based article repository, SQLite and MySQL.
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

const ARTICLE_COLUMNS: &str =
    "id, slug, title, description, body, body_html, author_id, created_at, updated_at";

/// Takes three viewer binds: following, liked, bookmarked.
fn view_select() -> String {
    format!(
        r#"
        SELECT a.id, a.slug, a.title, a.description, a.body, a.body_html, a.author_id,
               a.created_at, a.updated_at,
               {author},
               (SELECT COUNT(*) FROM likes l WHERE l.article_id = a.id) AS like_count,
               (SELECT COUNT(*) FROM comments c WHERE c.article_id = a.id) AS comment_count,
               (SELECT COUNT(*) FROM bookmarks b WHERE b.article_id = a.id) AS bookmark_count,
               EXISTS(SELECT 1 FROM likes lv WHERE lv.article_id = a.id AND lv.user_id = ?) AS liked,
               EXISTS(SELECT 1 FROM bookmarks bv WHERE bv.article_id = a.id AND bv.user_id = ?) AS bookmarked
        FROM articles a
        INNER JOIN users u ON u.id = a.author_id
        "#,
        author = AUTHOR_PROFILE_COLUMNS
    )
}

/// Each filter is `(? IS NULL OR ...)`, so an unset filter binds NULL
/// and matches everything.
const FILTER_WHERE: &str = r#"
    WHERE (? IS NULL OR EXISTS (
            SELECT 1 FROM article_tags ft INNER JOIN tags t ON t.id = ft.tag_id
            WHERE ft.article_id = a.id AND (t.slug = ? OR t.name = ?)))
      AND (? IS NULL OR u.username = ?)
      AND (? IS NULL OR EXISTS (
            SELECT 1 FROM likes fl INNER JOIN users lu ON lu.id = fl.user_id
            WHERE fl.article_id = a.id AND lu.username = ?))
      AND (? IS NULL OR EXISTS (
            SELECT 1 FROM bookmarks fb WHERE fb.article_id = a.id AND fb.user_id = ?))
      AND (? IS NULL OR EXISTS (
            SELECT 1 FROM follows ff WHERE ff.followee_id = a.author_id AND ff.follower_id = ?))
      AND (? IS NULL OR LOWER(a.title) LIKE ? ESCAPE '!' OR LOWER(a.description) LIKE ? ESCAPE '!')
"#;

const ORDER_NEWEST: &str = " ORDER BY a.created_at DESC, a.id DESC";

/// Owned bind values for [`FILTER_WHERE`].
struct FilterBinds {
    tag: Option<String>,
    author: Option<String>,
    liked_by: Option<String>,
    bookmarked_by: Option<i64>,
    feed_of: Option<i64>,
    search: Option<String>,
}

impl FilterBinds {
    fn from_query(query: &ArticleQuery) -> Self {
        Self {
            tag: query.tag.clone(),
            author: query.author.clone(),
            liked_by: query.liked_by.clone(),
            bookmarked_by: query.bookmarked_by,
            feed_of: query.feed_of,
            search: query.search_term().map(|term| like_pattern(&term)),
        }
    }
}

macro_rules! bind_filters {
    ($query:expr, $f:expr) => {
        $query
            .bind($f.tag.as_deref())
            .bind($f.tag.as_deref())
            .bind($f.tag.as_deref())
            .bind($f.author.as_deref())
            .bind($f.author.as_deref())
            .bind($f.liked_by.as_deref())
            .bind($f.liked_by.as_deref())
            .bind($f.bookmarked_by)
            .bind($f.bookmarked_by)
            .bind($f.feed_of)
            .bind($f.feed_of)
            .bind($f.search.as_deref())
            .bind($f.search.as_deref())
            .bind($f.search.as_deref())
    };
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, article: &Article) -> Result<Article> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_article_sqlite(p, article).await,
            Backend::Mysql(p) => create_article_mysql(p, article).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(p) => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get article by ID")?
                .map(|r| row_to_article_sqlite(&r))),
            Backend::Mysql(p) => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get article by ID")?
                .map(|r| row_to_article_mysql(&r))),
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE slug = ?", ARTICLE_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(p) => Ok(sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get article by slug")?
                .map(|r| row_to_article_sqlite(&r))),
            Backend::Mysql(p) => Ok(sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get article by slug")?
                .map(|r| row_to_article_mysql(&r))),
        }
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM articles WHERE slug = ?";
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(slug)
                .fetch_one(p)
                .await
                .context("Failed to check slug existence")?
                .get("count"),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(slug)
                .fetch_one(p)
                .await
                .context("Failed to check slug existence")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn update(&self, article: &Article) -> Result<Article> {
        let sql = r#"
            UPDATE articles
            SET slug = ?, title = ?, description = ?, body = ?, body_html = ?, updated_at = ?
            WHERE id = ?
        "#;
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(sql)
                    .bind(&article.slug)
                    .bind(&article.title)
                    .bind(&article.description)
                    .bind(&article.body)
                    .bind(&article.body_html)
                    .bind(now)
                    .bind(article.id)
                    .execute(p)
                    .await
                    .context("Failed to update article")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(sql)
                    .bind(&article.slug)
                    .bind(&article.title)
                    .bind(&article.description)
                    .bind(&article.body)
                    .bind(&article.body_html)
                    .bind(now)
                    .bind(article.id)
                    .execute(p)
                    .await
                    .context("Failed to update article")?;
            }
        }
        Ok(Article {
            updated_at: now,
            ..article.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query("DELETE FROM articles WHERE id = ?")
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to delete article")?;
            }
            Backend::Mysql(p) => {
                sqlx::query("DELETE FROM articles WHERE id = ?")
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to delete article")?;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM articles";
        Ok(match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .fetch_one(p)
                .await
                .context("Failed to count articles")?
                .get("count"),
            Backend::Mysql(p) => sqlx::query(sql)
                .fetch_one(p)
                .await
                .context("Failed to count articles")?
                .get("count"),
        })
    }

    async fn list_views(
        &self,
        query: &ArticleQuery,
        viewer: Option<i64>,
    ) -> Result<(Vec<ArticleView>, i64)> {
        let filters = FilterBinds::from_query(query);
        match self.pool.backend() {
            Backend::Sqlite(p) => list_views_sqlite(p, query, &filters, viewer).await,
            Backend::Mysql(p) => list_views_mysql(p, query, &filters, viewer).await,
        }
    }

    async fn get_view(&self, id: i64, viewer: Option<i64>) -> Result<Option<ArticleView>> {
        let sql = format!("{} WHERE a.id = ?", view_select());
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(&sql)
                    .bind(viewer)
                    .bind(viewer)
                    .bind(viewer)
                    .bind(id)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get article view")?;
                match row {
                    Some(row) => {
                        let mut views = vec![row_to_view_sqlite(&row)];
                        attach_tags_sqlite(p, &mut views).await?;
                        Ok(views.pop())
                    }
                    None => Ok(None),
                }
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(&sql)
                    .bind(viewer)
                    .bind(viewer)
                    .bind(viewer)
                    .bind(id)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get article view")?;
                match row {
                    Some(row) => {
                        let mut views = vec![row_to_view_mysql(&row)];
                        attach_tags_mysql(p, &mut views).await?;
                        Ok(views.pop())
                    }
                    None => Ok(None),
                }
            }
        }
    }
}

fn tags_for_articles_sql(n: usize) -> String {
    format!(
        r#"
        SELECT at.article_id, t.name
        FROM article_tags at
        INNER JOIN tags t ON t.id = at.tag_id
        WHERE at.article_id IN ({})
        ORDER BY t.name ASC
        "#,
        placeholders(n)
    )
}

fn distribute_tags(views: &mut [ArticleView], pairs: Vec<(i64, String)>) {
    let mut by_article: HashMap<i64, Vec<String>> = HashMap::new();
    for (article_id, name) in pairs {
        by_article.entry(article_id).or_default().push(name);
    }
    for view in views.iter_mut() {
        view.tags = by_article.remove(&view.id).unwrap_or_default();
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_article_sqlite(pool: &SqlitePool, article: &Article) -> Result<Article> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, description, body, body_html, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&article.slug)
    .bind(&article.title)
    .bind(&article.description)
    .bind(&article.body)
    .bind(&article.body_html)
    .bind(article.author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(Article {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..article.clone()
    })
}

async fn list_views_sqlite(
    pool: &SqlitePool,
    query: &ArticleQuery,
    filters: &FilterBinds,
    viewer: Option<i64>,
) -> Result<(Vec<ArticleView>, i64)> {
    let count_sql = format!(
        "SELECT COUNT(*) as count FROM articles a INNER JOIN users u ON u.id = a.author_id {}",
        FILTER_WHERE
    );
    let total: i64 = bind_filters!(sqlx::query(&count_sql), filters)
        .fetch_one(pool)
        .await
        .context("Failed to count articles")?
        .get("count");

    let sql = format!("{}{}{} LIMIT ? OFFSET ?", view_select(), FILTER_WHERE, ORDER_NEWEST);
    let rows = bind_filters!(
        sqlx::query(&sql).bind(viewer).bind(viewer).bind(viewer),
        filters
    )
    .bind(query.limit)
    .bind(query.offset)
    .fetch_all(pool)
    .await
    .context("Failed to list articles")?;

    let mut views: Vec<ArticleView> = rows.iter().map(row_to_view_sqlite).collect();
    attach_tags_sqlite(pool, &mut views).await?;
    Ok((views, total))
}

async fn attach_tags_sqlite(pool: &SqlitePool, views: &mut [ArticleView]) -> Result<()> {
    if views.is_empty() {
        return Ok(());
    }
    let sql = tags_for_articles_sql(views.len());
    let mut q = sqlx::query(&sql);
    for view in views.iter() {
        q = q.bind(view.id);
    }
    let pairs = q
        .fetch_all(pool)
        .await
        .context("Failed to load article tags")?
        .iter()
        .map(|r| (r.get("article_id"), r.get("name")))
        .collect();
    distribute_tags(views, pairs);
    Ok(())
}

fn row_to_article_sqlite(row: &sqlx::sqlite::SqliteRow) -> Article {
    Article {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        body: row.get("body"),
        body_html: row.get("body_html"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_view_sqlite(row: &sqlx::sqlite::SqliteRow) -> ArticleView {
    ArticleView {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        body: row.get("body"),
        body_html: row.get("body_html"),
        tags: Vec::new(),
        author: author_profile_sqlite(row),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        bookmark_count: row.get("bookmark_count"),
        liked: row.get::<i64, _>("liked") != 0,
        bookmarked: row.get::<i64, _>("bookmarked") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_article_mysql(pool: &MySqlPool, article: &Article) -> Result<Article> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, description, body, body_html, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&article.slug)
    .bind(&article.title)
    .bind(&article.description)
    .bind(&article.body)
    .bind(&article.body_html)
    .bind(article.author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(Article {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..article.clone()
    })
}

async fn list_views_mysql(
    pool: &MySqlPool,
    query: &ArticleQuery,
    filters: &FilterBinds,
    viewer: Option<i64>,
) -> Result<(Vec<ArticleView>, i64)> {
    let count_sql = format!(
        "SELECT COUNT(*) as count FROM articles a INNER JOIN users u ON u.id = a.author_id {}",
        FILTER_WHERE
    );
    let total: i64 = bind_filters!(sqlx::query(&count_sql), filters)
        .fetch_one(pool)
        .await
        .context("Failed to count articles")?
        .get("count");

    let sql = format!("{}{}{} LIMIT ? OFFSET ?", view_select(), FILTER_WHERE, ORDER_NEWEST);
    let rows = bind_filters!(
        sqlx::query(&sql).bind(viewer).bind(viewer).bind(viewer),
        filters
    )
    .bind(query.limit)
    .bind(query.offset)
    .fetch_all(pool)
    .await
    .context("Failed to list articles")?;

    let mut views: Vec<ArticleView> = rows.iter().map(row_to_view_mysql).collect();
    attach_tags_mysql(pool, &mut views).await?;
    Ok((views, total))
}

async fn attach_tags_mysql(pool: &MySqlPool, views: &mut [ArticleView]) -> Result<()> {
    if views.is_empty() {
        return Ok(());
    }
    let sql = tags_for_articles_sql(views.len());
    let mut q = sqlx::query(&sql);
    for view in views.iter() {
        q = q.bind(view.id);
    }
    let pairs = q
        .fetch_all(pool)
        .await
        .context("Failed to load article tags")?
        .iter()
        .map(|r| (r.get("article_id"), r.get("name")))
        .collect();
    distribute_tags(views, pairs);
    Ok(())
}

fn row_to_article_mysql(row: &sqlx::mysql::MySqlRow) -> Article {
    Article {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        body: row.get("body"),
        body_html: row.get("body_html"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_view_mysql(row: &sqlx::mysql::MySqlRow) -> ArticleView {
    ArticleView {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        body: row.get("body"),
        body_html: row.get("body_html"),
        tags: Vec::new(),
        author: author_profile_mysql(row),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        bookmark_count: row.get("bookmark_count"),
        liked: row.get::<i64, _>("liked") != 0,
        bookmarked: row.get::<i64, _>("bookmarked") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
