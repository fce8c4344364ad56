//! Storage layer
//!
//! Two interchangeable backends sit behind the repository traits:
//! - SQLx over SQLite (default) or MySQL, see [`pool`] and [`migrations`]
//! - [`memory::MemoryStore`], a process-local store for tests and demos
//!
//! The driver is picked from [`crate::config::DatabaseConfig`].
//!
//! ```ignore
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! let repos = Repositories::sqlx(pool);
//! ```

pub mod memory;
pub mod migrations;
pub mod pool;
pub mod repositories;

pub use memory::MemoryStore;
pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
pub use repositories::Repositories;
