//! Like and bookmark repository
//!
//! Likes and bookmarks share one shape, a `(user_id, article_id)` pair,
//! so a single repository serves both tables.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

use crate::db::pool::Backend;
use crate::db::DynDatabasePool;

/// Which per-user article mark a repository manages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
    Like,
    Bookmark,
}

impl MarkKind {
    pub fn table(&self) -> &'static str {
        match self {
            MarkKind::Like => "likes",
            MarkKind::Bookmark => "bookmarks",
        }
    }
}

/// Mark repository trait
#[async_trait]
pub trait MarkRepository: Send + Sync {
    fn kind(&self) -> MarkKind;

    /// Returns false if the mark already existed
    async fn add(&self, user_id: i64, article_id: i64) -> Result<bool>;

    /// Returns false if there was nothing to remove
    async fn remove(&self, user_id: i64, article_id: i64) -> Result<bool>;

    async fn exists(&self, user_id: i64, article_id: i64) -> Result<bool>;

    async fn count_by_article(&self, article_id: i64) -> Result<i64>;
}

/// SQLx-based mark repository, SQLite and MySQL.
pub struct SqlxMarkRepository {
    pool: DynDatabasePool,
    kind: MarkKind,
}

impl SqlxMarkRepository {
    pub fn new(pool: DynDatabasePool, kind: MarkKind) -> Self {
        Self { pool, kind }
    }

    pub fn likes(pool: DynDatabasePool) -> Arc<dyn MarkRepository> {
        Arc::new(Self::new(pool, MarkKind::Like))
    }

    pub fn bookmarks(pool: DynDatabasePool) -> Arc<dyn MarkRepository> {
        Arc::new(Self::new(pool, MarkKind::Bookmark))
    }
}

#[async_trait]
impl MarkRepository for SqlxMarkRepository {
    fn kind(&self) -> MarkKind {
        self.kind
    }

    async fn add(&self, user_id: i64, article_id: i64) -> Result<bool> {
        let table = self.kind.table();
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&format!(
                "INSERT OR IGNORE INTO {} (user_id, article_id, created_at) VALUES (?, ?, ?)",
                table
            ))
            .bind(user_id)
            .bind(article_id)
            .bind(now)
            .execute(p)
            .await
            .with_context(|| format!("Failed to insert into {}", table))?
            .rows_affected(),
            Backend::Mysql(p) => sqlx::query(&format!(
                "INSERT IGNORE INTO {} (user_id, article_id, created_at) VALUES (?, ?, ?)",
                table
            ))
            .bind(user_id)
            .bind(article_id)
            .bind(now)
            .execute(p)
            .await
            .with_context(|| format!("Failed to insert into {}", table))?
            .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn remove(&self, user_id: i64, article_id: i64) -> Result<bool> {
        let table = self.kind.table();
        let sql = format!("DELETE FROM {} WHERE user_id = ? AND article_id = ?", table);
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(user_id)
                .bind(article_id)
                .execute(p)
                .await
                .with_context(|| format!("Failed to delete from {}", table))?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(user_id)
                .bind(article_id)
                .execute(p)
                .await
                .with_context(|| format!("Failed to delete from {}", table))?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists(&self, user_id: i64, article_id: i64) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) as count FROM {} WHERE user_id = ? AND article_id = ?",
            self.kind.table()
        );
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(user_id)
                .bind(article_id)
                .fetch_one(p)
                .await?
                .get("count"),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(user_id)
                .bind(article_id)
                .fetch_one(p)
                .await?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn count_by_article(&self, article_id: i64) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) as count FROM {} WHERE article_id = ?",
            self.kind.table()
        );
        Ok(match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(article_id)
                .fetch_one(p)
                .await?
                .get("count"),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(article_id)
                .fetch_one(p)
                .await?
                .get("count"),
        })
    }
}
