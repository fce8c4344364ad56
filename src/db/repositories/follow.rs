//! Follow repository
//!
//! Directed follower -> followee edges between users.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

use super::user::{row_to_user_mysql, row_to_user_sqlite};
use super::views::{follow_stats_mysql, follow_stats_sqlite};
use crate::db::pool::Backend;
use crate::db::DynDatabasePool;
use crate::models::{FollowStats, User};

/// Follow repository trait
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Returns false if the edge already existed
    async fn follow(&self, follower_id: i64, followee_id: i64) -> Result<bool>;

    async fn unfollow(&self, follower_id: i64, followee_id: i64) -> Result<bool>;

    async fn is_following(&self, follower_id: i64, followee_id: i64) -> Result<bool>;

    /// Counts for `user_id` and whether `viewer` follows them
    async fn stats(&self, user_id: i64, viewer: Option<i64>) -> Result<FollowStats>;

    /// Users following `user_id`, most recent first
    async fn list_followers(&self, user_id: i64, offset: i64, limit: i64)
        -> Result<(Vec<User>, i64)>;

    /// Users `user_id` follows, most recent first
    async fn list_following(&self, user_id: i64, offset: i64, limit: i64)
        -> Result<(Vec<User>, i64)>;
}

/// SQLx-based follow repository, SQLite and MySQL.
pub struct SqlxFollowRepository {
    pool: DynDatabasePool,
}

impl SqlxFollowRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowRepository> {
        Arc::new(Self::new(pool))
    }

    /// `join_on` is the follows column matched against users.id, `filter_on`
    /// the column matched against `user_id`.
    async fn list_edge(
        &self,
        join_on: &str,
        filter_on: &str,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<User>, i64)> {
        let count_sql = format!("SELECT COUNT(*) as count FROM follows WHERE {} = ?", filter_on);
        let sql = format!(
            r#"
            SELECT u.id, u.username, u.email, u.password_hash, u.role, u.status,
                   u.display_name, u.bio, u.image, u.created_at, u.updated_at
            FROM follows f
            INNER JOIN users u ON u.id = f.{join_on}
            WHERE f.{filter_on} = ?
            ORDER BY f.created_at DESC, u.id DESC
            LIMIT ? OFFSET ?
            "#,
        );
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let total: i64 = sqlx::query(&count_sql)
                    .bind(user_id)
                    .fetch_one(p)
                    .await
                    .context("Failed to count follows")?
                    .get("count");
                let users = sqlx::query(&sql)
                    .bind(user_id)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(p)
                    .await
                    .context("Failed to list follows")?
                    .iter()
                    .map(row_to_user_sqlite)
                    .collect::<Result<Vec<_>>>()?;
                Ok((users, total))
            }
            Backend::Mysql(p) => {
                let total: i64 = sqlx::query(&count_sql)
                    .bind(user_id)
                    .fetch_one(p)
                    .await
                    .context("Failed to count follows")?
                    .get("count");
                let users = sqlx::query(&sql)
                    .bind(user_id)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(p)
                    .await
                    .context("Failed to list follows")?
                    .iter()
                    .map(row_to_user_mysql)
                    .collect::<Result<Vec<_>>>()?;
                Ok((users, total))
            }
        }
    }
}

const FOLLOW_STATS: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM follows WHERE followee_id = ?) AS follower_count,
        (SELECT COUNT(*) FROM follows WHERE follower_id = ?) AS following_count,
        EXISTS(SELECT 1 FROM follows WHERE followee_id = ? AND follower_id = ?) AS following
"#;

#[async_trait]
impl FollowRepository for SqlxFollowRepository {
    async fn follow(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(
                "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(follower_id)
            .bind(followee_id)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to follow user")?
            .rows_affected(),
            Backend::Mysql(p) => sqlx::query(
                "INSERT IGNORE INTO follows (follower_id, followee_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(follower_id)
            .bind(followee_id)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to follow user")?
            .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn unfollow(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let sql = "DELETE FROM follows WHERE follower_id = ? AND followee_id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(follower_id)
                .bind(followee_id)
                .execute(p)
                .await
                .context("Failed to unfollow user")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(follower_id)
                .bind(followee_id)
                .execute(p)
                .await
                .context("Failed to unfollow user")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn is_following(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM follows WHERE follower_id = ? AND followee_id = ?";
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(follower_id)
                .bind(followee_id)
                .fetch_one(p)
                .await?
                .get("count"),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(follower_id)
                .bind(followee_id)
                .fetch_one(p)
                .await?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn stats(&self, user_id: i64, viewer: Option<i64>) -> Result<FollowStats> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(FOLLOW_STATS)
                    .bind(user_id)
                    .bind(user_id)
                    .bind(user_id)
                    .bind(viewer)
                    .fetch_one(p)
                    .await
                    .context("Failed to load follow stats")?;
                Ok(follow_stats_sqlite(&row))
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(FOLLOW_STATS)
                    .bind(user_id)
                    .bind(user_id)
                    .bind(user_id)
                    .bind(viewer)
                    .fetch_one(p)
                    .await
                    .context("Failed to load follow stats")?;
                Ok(follow_stats_mysql(&row))
            }
        }
    }

    async fn list_followers(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<User>, i64)> {
        self.list_edge("follower_id", "followee_id", user_id, offset, limit)
            .await
    }

    async fn list_following(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<User>, i64)> {
        self.list_edge("followee_id", "follower_id", user_id, offset, limit)
            .await
    }
}
