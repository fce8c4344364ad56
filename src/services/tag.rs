//! Tag service
//!
//! Create-or-reuse tags by name, resolve the tag list of an article and
//! serve the popular-tags list from cache.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::TagRepository;
use crate::models::{Tag, TagWithCount};
use crate::services::article::generate_slug;
use anyhow::Context;
use std::collections::HashSet;
use std::sync::Arc;

/// Upper bound for the full tag list
const MAX_TAGS: usize = 1000;

const MAX_TAG_LEN: usize = 50;

const MAX_SLUG_SUFFIX: usize = 1000;

const POPULAR_CACHE_PREFIX: &str = "tags:popular:";

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct TagService {
    repo: Arc<dyn TagRepository>,
    cache: Arc<MemoryCache>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>, cache: Arc<MemoryCache>) -> Self {
        Self { repo, cache }
    }

    /// Existing tag whose name matches case-insensitively, or a new one.
    ///
    /// "Rust" and "rust" are the same tag. Distinct names that slug alike
    /// ("C++", "C#") get distinct tags with `-2`, `-3` slugs.
    pub async fn create_or_get(&self, name: &str) -> Result<Tag, TagServiceError> {
        let (name, base) = normalize_name(name)?;

        if let Some(existing) = self
            .repo
            .get_by_name(&name)
            .await
            .context("Failed to check existing tag")?
        {
            return Ok(existing);
        }

        let slug = self.free_slug(&base).await?;
        let created = self
            .repo
            .create(&Tag::new(slug, name))
            .await
            .context("Failed to create tag")?;
        self.invalidate().await;
        Ok(created)
    }

    /// Tags for a list of user-supplied names: trimmed, empties dropped,
    /// duplicates (ASCII case-insensitive) collapsed, first spelling wins.
    ///
    /// Every name is validated before any tag is created.
    pub async fn resolve(&self, names: &[String]) -> Result<Vec<Tag>, TagServiceError> {
        let mut seen = HashSet::new();
        let mut wanted = Vec::new();
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            normalize_name(name)?;
            if seen.insert(name.to_ascii_lowercase()) {
                wanted.push(name);
            }
        }

        let mut tags: Vec<Tag> = Vec::with_capacity(wanted.len());
        for name in wanted {
            let tag = self.create_or_get(name).await?;
            if !tags.iter().any(|t| t.id == tag.id) {
                tags.push(tag);
            }
        }
        Ok(tags)
    }

    /// Replace an article's tags with already resolved `tags`
    pub async fn set_article_tags(
        &self,
        article_id: i64,
        tags: &[Tag],
    ) -> Result<(), TagServiceError> {
        self.repo
            .clear_article(article_id)
            .await
            .context("Failed to clear article tags")?;
        for tag in tags {
            self.repo
                .add_to_article(tag.id, article_id)
                .await
                .context("Failed to tag article")?;
        }
        self.invalidate().await;
        Ok(())
    }

    /// All tags ordered by name
    pub async fn list(&self) -> Result<Vec<Tag>, TagServiceError> {
        Ok(self.repo.list().await.context("Failed to list tags")?)
    }

    /// All tags with article counts, most used first
    pub async fn list_with_counts(&self) -> Result<Vec<TagWithCount>, TagServiceError> {
        Ok(self
            .repo
            .get_with_counts(MAX_TAGS)
            .await
            .context("Failed to list tags")?)
    }

    /// The `limit` most used tags, served from cache when warm.
    pub async fn popular(&self, limit: usize) -> Result<Vec<TagWithCount>, TagServiceError> {
        let key = format!("{}{}", POPULAR_CACHE_PREFIX, limit);
        match self.cache.get::<Vec<TagWithCount>>(&key).await {
            Ok(Some(hit)) => return Ok(hit),
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring unreadable cache entry {}: {:#}", key, e),
        }

        let tags = self
            .repo
            .get_with_counts(limit)
            .await
            .context("Failed to get popular tags")?;
        if let Err(e) = self.cache.set(&key, &tags, self.cache.default_ttl()).await {
            tracing::warn!("Failed to cache popular tags: {:#}", e);
        }
        Ok(tags)
    }

    /// Remove tags no article uses any more; returns how many went.
    pub async fn prune_unused(&self) -> Result<u64, TagServiceError> {
        let removed = self
            .repo
            .delete_unused()
            .await
            .context("Failed to delete unused tags")?;
        if removed > 0 {
            tracing::debug!(removed, "Pruned unused tags");
        }
        self.invalidate().await;
        Ok(removed)
    }

    /// Drop cached tag lists
    pub async fn invalidate(&self) {
        let pattern = format!("{}*", POPULAR_CACHE_PREFIX);
        if let Err(e) = self.cache.delete_pattern(&pattern).await {
            tracing::warn!("Failed to invalidate tag cache: {:#}", e);
        }
    }

    /// `base`, or `base-2`, `base-3`, ... whichever no tag uses yet.
    async fn free_slug(&self, base: &str) -> Result<String, TagServiceError> {
        for n in 1..=MAX_SLUG_SUFFIX {
            let candidate = match n {
                1 => base.to_string(),
                n => format!("{}-{}", base, n),
            };
            if self
                .repo
                .get_by_slug(&candidate)
                .await
                .context("Failed to check tag slug")?
                .is_none()
            {
                return Ok(candidate);
            }
        }
        Err(anyhow::anyhow!("No free slug for tag '{}'", base).into())
    }
}

/// Trimmed name and its base slug, or why the name is unusable
fn normalize_name(name: &str) -> Result<(String, String), TagServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TagServiceError::ValidationError(
            "Tag name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_TAG_LEN {
        return Err(TagServiceError::ValidationError(format!(
            "Tag name cannot exceed {} characters",
            MAX_TAG_LEN
        )));
    }
    let slug = generate_tag_slug(name);
    if slug.is_empty() {
        return Err(TagServiceError::ValidationError(format!(
            "Tag name '{}' has no usable characters",
            name
        )));
    }
    Ok((name.to_string(), slug))
}

/// URL slug for a tag name
pub fn generate_tag_slug(name: &str) -> String {
    generate_slug(name)
}
