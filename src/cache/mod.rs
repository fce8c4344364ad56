//! Cache layer
//!
//! Process-local caching of hot read models (article rows by slug, the
//! popular tag list). Entries are stored as JSON so any serializable value
//! fits, and every entry carries its own TTL.
//!
//! ```rust,ignore
//! use quill::cache::{create_cache, CacheLayer};
//!
//! let cache = create_cache(&config.cache);
//! cache.set("article:hello", &article, cache.default_ttl()).await?;
//! cache.delete_pattern("article:*").await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache operations used by the services.
///
/// The generic methods make this trait unusable as `dyn CacheLayer`;
/// services hold the concrete cache instead.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration)
        -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key matching a glob (`*` and `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Build the cache described by `config`
pub fn create_cache(config: &CacheConfig) -> Arc<MemoryCache> {
    Arc::new(MemoryCache::with_capacity_and_ttl(
        config.max_capacity,
        Duration::from_secs(config.ttl_seconds),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_from_config() {
        let config = CacheConfig {
            ttl_seconds: 120,
            max_capacity: 50,
        };
        let cache = create_cache(&config);
        assert_eq!(cache.default_ttl(), Duration::from_secs(120));

        cache
            .set("greeting", &"hello".to_string(), cache.default_ttl())
            .await
            .unwrap();
        let hit: Option<String> = cache.get("greeting").await.unwrap();
        assert_eq!(hit.as_deref(), Some("hello"));
    }
}
