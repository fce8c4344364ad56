//! Session repository
//!
//! Database operations for login sessions.

use crate::db::pool::Backend;
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Look up a session by token, expired or not
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Returns the number of sessions removed
    async fn delete_expired(&self) -> Result<i64>;
}

/// SQLx-based session repository, SQLite and MySQL.
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_SESSION: &str =
    "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)";
const SELECT_SESSION: &str =
    "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?";

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(INSERT_SESSION)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(p)
                    .await
                    .context("Failed to create session")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(INSERT_SESSION)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(p)
                    .await
                    .context("Failed to create session")?;
            }
        }
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(SELECT_SESSION)
                    .bind(id)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get session")?;
                Ok(row.map(|row| Session {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }))
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(SELECT_SESSION)
                    .bind(id)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get session")?;
                Ok(row.map(|row| Session {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }))
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query("DELETE FROM sessions WHERE id = ?")
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to delete session")?;
            }
            Backend::Mysql(p) => {
                sqlx::query("DELETE FROM sessions WHERE id = ?")
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to delete session")?;
            }
        }
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query("DELETE FROM sessions WHERE user_id = ?")
                    .bind(user_id)
                    .execute(p)
                    .await
                    .context("Failed to delete user sessions")?;
            }
            Backend::Mysql(p) => {
                sqlx::query("DELETE FROM sessions WHERE user_id = ?")
                    .bind(user_id)
                    .execute(p)
                    .await
                    .context("Failed to delete user sessions")?;
            }
        }
        Ok(())
    }

    async fn delete_expired(&self) -> Result<i64> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
                .bind(now)
                .execute(p)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
                .bind(now)
                .execute(p)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
        };
        Ok(affected as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxSessionRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        (pool.clone(), SqlxSessionRepository::new(pool))
    }

    async fn create_test_user(pool: &DynDatabasePool, id: i64) {
        sqlx::query("INSERT INTO users (id, username, email, password_hash) VALUES (?, ?, ?, 'hash')")
            .bind(id)
            .bind(format!("user{}", id))
            .bind(format!("user{}@example.com", id))
            .execute(pool.as_sqlite().unwrap())
            .await
            .expect("Failed to create test user");
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;

        let session = Session::issue(1, Duration::days(7));
        repo.create(&session).await.unwrap();

        let found = repo.get_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found.user_id, 1);
        assert!(!found.is_expired());
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_sessions_by_user() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;
        create_test_user(&pool, 2).await;

        let s1 = Session::issue(1, Duration::days(7));
        let s2 = Session::issue(1, Duration::days(7));
        let s3 = Session::issue(2, Duration::days(7));
        for s in [&s1, &s2, &s3] {
            repo.create(s).await.unwrap();
        }

        repo.delete_by_user(1).await.unwrap();

        assert!(repo.get_by_id(&s1.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&s2.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&s3.id).await.unwrap().is_some());

        repo.delete(&s3.id).await.unwrap();
        assert!(repo.get_by_id(&s3.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;

        let expired = Session::issue(1, Duration::days(-1));
        let valid = Session::issue(1, Duration::days(7));
        repo.create(&expired).await.unwrap();
        repo.create(&valid).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.get_by_id(&expired.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&valid.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sessions_removed_with_user() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;
        let session = Session::issue(1, Duration::days(1));
        repo.create(&session).await.unwrap();

        pool.execute("DELETE FROM users WHERE id = 1").await.unwrap();

        assert!(repo.get_by_id(&session.id).await.unwrap().is_none());
    }
}
