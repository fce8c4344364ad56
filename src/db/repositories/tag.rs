//! Tag repository
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL

use crate::db::pool::Backend;
use crate::db::DynDatabasePool;
use crate::models::{Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>>;

    /// Tag whose name equals `name`, ignoring ASCII case
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// All tags, ordered by name
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Tags with article counts for the tag cloud, most used first,
    /// ties broken by name
    async fn get_with_counts(&self, limit: usize) -> Result<Vec<TagWithCount>>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Link a tag to an article; linking twice is a no-op
    async fn add_to_article(&self, tag_id: i64, article_id: i64) -> Result<()>;

    async fn remove_from_article(&self, tag_id: i64, article_id: i64) -> Result<()>;

    /// Drop every tag link of an article
    async fn clear_article(&self, article_id: i64) -> Result<()>;

    /// Tags of an article, ordered by name
    async fn get_by_article_id(&self, article_id: i64) -> Result<Vec<Tag>>;

    /// Delete tags no article uses any more. Returns how many went.
    async fn delete_unused(&self) -> Result<u64>;
}

/// SQLx-based tag repository, SQLite and MySQL.
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

const TAG_COLUMNS: &str = "id, slug, name, created_at";

const TAGS_WITH_COUNTS: &str = r#"
    SELECT t.id, t.slug, t.name, t.created_at, COUNT(at.article_id) as article_count
    FROM tags t
    LEFT JOIN article_tags at ON t.id = at.tag_id
    GROUP BY t.id, t.slug, t.name, t.created_at
    ORDER BY article_count DESC, t.name ASC
    LIMIT ?
"#;

const TAGS_BY_ARTICLE: &str = r#"
    SELECT t.id, t.slug, t.name, t.created_at
    FROM tags t
    INNER JOIN article_tags at ON t.id = at.tag_id
    WHERE at.article_id = ?
    ORDER BY t.name ASC
"#;

const DELETE_UNUSED: &str =
    "DELETE FROM tags WHERE NOT EXISTS (SELECT 1 FROM article_tags at WHERE at.tag_id = tags.id)";

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_tag_sqlite(p, tag).await,
            Backend::Mysql(p) => create_tag_mysql(p, tag).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        let sql = format!("SELECT {} FROM tags WHERE id = ?", TAG_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(p) => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get tag by ID")?
                .map(|r| row_to_tag_sqlite(&r))),
            Backend::Mysql(p) => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get tag by ID")?
                .map(|r| row_to_tag_mysql(&r))),
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let sql = format!("SELECT {} FROM tags WHERE slug = ?", TAG_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(p) => Ok(sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get tag by slug")?
                .map(|r| row_to_tag_sqlite(&r))),
            Backend::Mysql(p) => Ok(sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get tag by slug")?
                .map(|r| row_to_tag_mysql(&r))),
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => Ok(sqlx::query(&format!(
                "SELECT {} FROM tags WHERE name = ? COLLATE NOCASE ORDER BY id LIMIT 1",
                TAG_COLUMNS
            ))
                .bind(name)
                .fetch_optional(p)
                .await
                .context("Failed to get tag by name")?
                .map(|r| row_to_tag_sqlite(&r))),
            // The default MySQL collation already ignores case
            Backend::Mysql(p) => Ok(sqlx::query(&format!(
                "SELECT {} FROM tags WHERE name = ? ORDER BY id LIMIT 1",
                TAG_COLUMNS
            ))
                .bind(name)
                .fetch_optional(p)
                .await
                .context("Failed to get tag by name")?
                .map(|r| row_to_tag_mysql(&r))),
        }
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        let sql = format!("SELECT {} FROM tags ORDER BY name ASC", TAG_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(p) => Ok(sqlx::query(&sql)
                .fetch_all(p)
                .await
                .context("Failed to list tags")?
                .iter()
                .map(row_to_tag_sqlite)
                .collect()),
            Backend::Mysql(p) => Ok(sqlx::query(&sql)
                .fetch_all(p)
                .await
                .context("Failed to list tags")?
                .iter()
                .map(row_to_tag_mysql)
                .collect()),
        }
    }

    async fn get_with_counts(&self, limit: usize) -> Result<Vec<TagWithCount>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => Ok(sqlx::query(TAGS_WITH_COUNTS)
                .bind(limit as i64)
                .fetch_all(p)
                .await
                .context("Failed to get tags with counts")?
                .iter()
                .map(|r| TagWithCount::new(row_to_tag_sqlite(r), r.get("article_count")))
                .collect()),
            Backend::Mysql(p) => Ok(sqlx::query(TAGS_WITH_COUNTS)
                .bind(limit as i64)
                .fetch_all(p)
                .await
                .context("Failed to get tags with counts")?
                .iter()
                .map(|r| TagWithCount::new(row_to_tag_mysql(r), r.get("article_count")))
                .collect()),
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query("DELETE FROM tags WHERE id = ?")
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to delete tag")?;
            }
            Backend::Mysql(p) => {
                sqlx::query("DELETE FROM tags WHERE id = ?")
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to delete tag")?;
            }
        }
        Ok(())
    }

    async fn add_to_article(&self, tag_id: i64, article_id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query("INSERT OR IGNORE INTO article_tags (article_id, tag_id) VALUES (?, ?)")
                    .bind(article_id)
                    .bind(tag_id)
                    .execute(p)
                    .await
                    .context("Failed to add tag to article")?;
            }
            Backend::Mysql(p) => {
                sqlx::query("INSERT IGNORE INTO article_tags (article_id, tag_id) VALUES (?, ?)")
                    .bind(article_id)
                    .bind(tag_id)
                    .execute(p)
                    .await
                    .context("Failed to add tag to article")?;
            }
        }
        Ok(())
    }

    async fn remove_from_article(&self, tag_id: i64, article_id: i64) -> Result<()> {
        let sql = "DELETE FROM article_tags WHERE article_id = ? AND tag_id = ?";
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(sql)
                    .bind(article_id)
                    .bind(tag_id)
                    .execute(p)
                    .await
                    .context("Failed to remove tag from article")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(sql)
                    .bind(article_id)
                    .bind(tag_id)
                    .execute(p)
                    .await
                    .context("Failed to remove tag from article")?;
            }
        }
        Ok(())
    }

    async fn clear_article(&self, article_id: i64) -> Result<()> {
        let sql = "DELETE FROM article_tags WHERE article_id = ?";
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(sql)
                    .bind(article_id)
                    .execute(p)
                    .await
                    .context("Failed to clear article tags")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(sql)
                    .bind(article_id)
                    .execute(p)
                    .await
                    .context("Failed to clear article tags")?;
            }
        }
        Ok(())
    }

    async fn get_by_article_id(&self, article_id: i64) -> Result<Vec<Tag>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => Ok(sqlx::query(TAGS_BY_ARTICLE)
                .bind(article_id)
                .fetch_all(p)
                .await
                .context("Failed to get article tags")?
                .iter()
                .map(row_to_tag_sqlite)
                .collect()),
            Backend::Mysql(p) => Ok(sqlx::query(TAGS_BY_ARTICLE)
                .bind(article_id)
                .fetch_all(p)
                .await
                .context("Failed to get article tags")?
                .iter()
                .map(row_to_tag_mysql)
                .collect()),
        }
    }

    async fn delete_unused(&self) -> Result<u64> {
        let removed = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(DELETE_UNUSED)
                .execute(p)
                .await
                .context("Failed to delete unused tags")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(DELETE_UNUSED)
                .execute(p)
                .await
                .context("Failed to delete unused tags")?
                .rows_affected(),
        };
        Ok(removed)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tag_sqlite(pool: &SqlitePool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO tags (slug, name, created_at) VALUES (?, ?, ?)")
        .bind(&tag.slug)
        .bind(&tag.name)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        slug: tag.slug.clone(),
        name: tag.name.clone(),
        created_at: now,
    })
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_tag_mysql(pool: &MySqlPool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO tags (slug, name, created_at) VALUES (?, ?, ?)")
        .bind(&tag.slug)
        .bind(&tag.name)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_id() as i64,
        slug: tag.slug.clone(),
        name: tag.name.clone(),
        created_at: now,
    })
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Tag {
    Tag {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}
