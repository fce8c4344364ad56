//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Profile;

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub author_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(article_id: i64, author_id: i64, body: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            article_id,
            author_id,
            body,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Comment with its author's profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i64,
    pub article_id: i64,
    pub body: String,
    pub author: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a comment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub body: String,
}
