//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::views::{author_profile_mysql, author_profile_sqlite, AUTHOR_PROFILE_COLUMNS};
use crate::db::pool::Backend;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentView};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: &Comment) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Replace the body; `None` when the comment does not exist
    async fn update(&self, id: i64, body: &str) -> Result<Option<Comment>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Comments on an article with author profiles, oldest first
    async fn list_views_by_article(
        &self,
        article_id: i64,
        viewer: Option<i64>,
    ) -> Result<Vec<CommentView>>;

    async fn get_view(&self, id: i64, viewer: Option<i64>) -> Result<Option<CommentView>>;

    async fn count_by_article(&self, article_id: i64) -> Result<i64>;
}

/// SQLx-based comment repository, SQLite and MySQL.
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const COMMENT_COLUMNS: &str = "id, article_id, author_id, body, created_at, updated_at";

fn view_select() -> String {
    format!(
        r#"
        SELECT c.id, c.article_id, c.author_id, c.body, c.created_at, c.updated_at,
               {}
        FROM comments c
        INNER JOIN users u ON u.id = c.author_id
        "#,
        AUTHOR_PROFILE_COLUMNS
    )
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_sqlite(p, comment).await,
            Backend::Mysql(p) => create_mysql(p, comment).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = ?", COMMENT_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(p) => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get comment")?
                .map(|r| row_to_comment_sqlite(&r))),
            Backend::Mysql(p) => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get comment")?
                .map(|r| row_to_comment_mysql(&r))),
        }
    }

    async fn update(&self, id: i64, body: &str) -> Result<Option<Comment>> {
        let sql = "UPDATE comments SET body = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(body)
                .bind(now)
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update comment")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(body)
                .bind(now)
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update comment")?
                .rows_affected(),
        };
        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_views_by_article(
        &self,
        article_id: i64,
        viewer: Option<i64>,
    ) -> Result<Vec<CommentView>> {
        let sql = format!(
            "{} WHERE c.article_id = ? ORDER BY c.created_at ASC, c.id ASC",
            view_select()
        );
        match self.pool.backend() {
            Backend::Sqlite(p) => Ok(sqlx::query(&sql)
                .bind(viewer)
                .bind(article_id)
                .fetch_all(p)
                .await
                .context("Failed to list comments")?
                .iter()
                .map(row_to_view_sqlite)
                .collect()),
            Backend::Mysql(p) => Ok(sqlx::query(&sql)
                .bind(viewer)
                .bind(article_id)
                .fetch_all(p)
                .await
                .context("Failed to list comments")?
                .iter()
                .map(row_to_view_mysql)
                .collect()),
        }
    }

    async fn get_view(&self, id: i64, viewer: Option<i64>) -> Result<Option<CommentView>> {
        let sql = format!("{} WHERE c.id = ?", view_select());
        match self.pool.backend() {
            Backend::Sqlite(p) => Ok(sqlx::query(&sql)
                .bind(viewer)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get comment view")?
                .map(|r| row_to_view_sqlite(&r))),
            Backend::Mysql(p) => Ok(sqlx::query(&sql)
                .bind(viewer)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get comment view")?
                .map(|r| row_to_view_mysql(&r))),
        }
    }

    async fn count_by_article(&self, article_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM comments WHERE article_id = ?";
        Ok(match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(article_id)
                .fetch_one(p)
                .await
                .context("Failed to count comments")?
                .get("count"),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(article_id)
                .fetch_one(p)
                .await
                .context("Failed to count comments")?
                .get("count"),
        })
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, comment: &Comment) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO comments (article_id, author_id, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(comment.article_id)
    .bind(comment.author_id)
    .bind(&comment.body)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..comment.clone()
    })
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        article_id: row.get("article_id"),
        author_id: row.get("author_id"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_view_sqlite(row: &sqlx::sqlite::SqliteRow) -> CommentView {
    CommentView {
        id: row.get("id"),
        article_id: row.get("article_id"),
        body: row.get("body"),
        author: author_profile_sqlite(row),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, comment: &Comment) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO comments (article_id, author_id, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(comment.article_id)
    .bind(comment.author_id)
    .bind(&comment.body)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..comment.clone()
    })
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        article_id: row.get("article_id"),
        author_id: row.get("author_id"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_view_mysql(row: &sqlx::mysql::MySqlRow) -> CommentView {
    CommentView {
        id: row.get("id"),
        article_id: row.get("article_id"),
        body: row.get("body"),
        author: author_profile_mysql(row),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxCommentRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute(
            "INSERT INTO users (id, username, email, password_hash) VALUES \
             (1, 'author', 'author@example.com', 'h'), (2, 'reader', 'reader@example.com', 'h')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO articles (id, slug, title, description, body, body_html, author_id) \
             VALUES (1, 'post', 'Post', '', 'b', '<p>b</p>', 1)",
        )
        .await
        .unwrap();
        (pool.clone(), SqlxCommentRepository::new(pool))
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let (_pool, repo) = setup_test_repo().await;

        let comment = repo
            .create(&Comment::new(1, 2, "First!".to_string()))
            .await
            .unwrap();
        assert!(comment.id > 0);

        let updated = repo.update(comment.id, "Edited").await.unwrap().unwrap();
        assert_eq!(updated.body, "Edited");
        assert!(repo.update(999, "x").await.unwrap().is_none());

        assert_eq!(repo.count_by_article(1).await.unwrap(), 1);
        assert!(repo.delete(comment.id).await.unwrap());
        assert!(!repo.delete(comment.id).await.unwrap());
        assert!(repo.get_by_id(comment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_views_oldest_first_with_author() {
        let (pool, repo) = setup_test_repo().await;
        pool.execute("INSERT INTO follows (follower_id, followee_id) VALUES (1, 2)")
            .await
            .unwrap();

        let first = repo.create(&Comment::new(1, 2, "one".to_string())).await.unwrap();
        let second = repo.create(&Comment::new(1, 1, "two".to_string())).await.unwrap();

        let views = repo.list_views_by_article(1, Some(1)).await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].id, first.id);
        assert_eq!(views[1].id, second.id);
        assert_eq!(views[0].author.username, "reader");
        assert!(views[0].author.following);
        assert!(!views[1].author.following);

        let view = repo.get_view(first.id, None).await.unwrap().unwrap();
        assert!(!view.author.following);
        assert_eq!(view.author.follower_count, 1);
    }

    #[tokio::test]
    async fn test_comments_removed_with_article() {
        let (pool, repo) = setup_test_repo().await;
        repo.create(&Comment::new(1, 2, "bye".to_string())).await.unwrap();

        pool.execute("DELETE FROM articles WHERE id = 1").await.unwrap();

        assert!(repo.list_views_by_article(1, None).await.unwrap().is_empty());
    }
}
