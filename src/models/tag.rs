//! Tag model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tag shared between articles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: i64,
    /// URL-friendly slug
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(slug: String, name: String) -> Self {
        Self {
            id: 0, // Will be set by the store
            slug,
            name,
            created_at: Utc::now(),
        }
    }
}

/// Tag with its article count, for the tag cloud
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub article_count: i64,
}

impl TagWithCount {
    pub fn new(tag: Tag, article_count: i64) -> Self {
        Self { tag, article_count }
    }
}
