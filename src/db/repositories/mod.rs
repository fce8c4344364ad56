//! Database repositories
//!
//! One trait per entity, each with a SQLx implementation over
//! [`DynDatabasePool`]. [`crate::db::memory::MemoryStore`] implements the
//! same traits without a database.

pub mod article;
pub mod comment;
pub mod follow;
pub mod mark;
pub mod session;
pub mod tag;
pub mod user;
mod views;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use follow::{FollowRepository, SqlxFollowRepository};
pub use mark::{MarkKind, MarkRepository, SqlxMarkRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};

use std::sync::Arc;

use super::memory::{MemoryMarks, MemoryStore};
use super::DynDatabasePool;

/// Every repository the services need, behind trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub likes: Arc<dyn MarkRepository>,
    pub bookmarks: Arc<dyn MarkRepository>,
    pub follows: Arc<dyn FollowRepository>,
}

impl Repositories {
    /// Repositories backed by a SQLite or MySQL pool
    pub fn sqlx(pool: DynDatabasePool) -> Self {
        Self {
            users: SqlxUserRepository::boxed(pool.clone()),
            sessions: SqlxSessionRepository::boxed(pool.clone()),
            articles: SqlxArticleRepository::boxed(pool.clone()),
            tags: SqlxTagRepository::boxed(pool.clone()),
            comments: SqlxCommentRepository::boxed(pool.clone()),
            likes: SqlxMarkRepository::likes(pool.clone()),
            bookmarks: SqlxMarkRepository::bookmarks(pool.clone()),
            follows: SqlxFollowRepository::boxed(pool),
        }
    }

    /// Repositories sharing one fresh in-memory store
    pub fn memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }

    pub fn from_store(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            sessions: store.clone(),
            articles: store.clone(),
            tags: store.clone(),
            comments: store.clone(),
            likes: Arc::new(MemoryMarks::new(store.clone(), MarkKind::Like)),
            bookmarks: Arc::new(MemoryMarks::new(store.clone(), MarkKind::Bookmark)),
            follows: store,
        }
    }
}
