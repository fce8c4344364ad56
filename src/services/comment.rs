//! Comment service
//!
//! Comments are addressed through their article's slug; a comment id that
//! belongs to another article is treated as missing.

use crate::db::repositories::{ArticleRepository, CommentRepository};
use crate::models::{Article, Comment, CommentView, CreateCommentInput, User};
use anyhow::Context;
use std::sync::Arc;

const MAX_COMMENT_LEN: usize = 5000;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    articles: Arc<dyn ArticleRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, articles: Arc<dyn ArticleRepository>) -> Self {
        Self { repo, articles }
    }

    pub async fn add(
        &self,
        slug: &str,
        author: &User,
        input: CreateCommentInput,
    ) -> Result<CommentView, CommentServiceError> {
        let body = validate_body(&input.body)?;
        let article = self.article(slug).await?;

        let comment = self
            .repo
            .create(&Comment::new(article.id, author.id, body))
            .await
            .context("Failed to create comment")?;

        tracing::debug!(comment_id = comment.id, article_id = article.id, "Comment added");
        self.view(comment.id, Some(author.id)).await
    }

    /// Comments on an article, oldest first
    pub async fn list(
        &self,
        slug: &str,
        viewer: Option<i64>,
    ) -> Result<Vec<CommentView>, CommentServiceError> {
        let article = self.article(slug).await?;
        Ok(self
            .repo
            .list_views_by_article(article.id, viewer)
            .await
            .context("Failed to list comments")?)
    }

    /// Only the comment's author may change its text.
    pub async fn edit(
        &self,
        slug: &str,
        id: i64,
        actor: &User,
        input: CreateCommentInput,
    ) -> Result<CommentView, CommentServiceError> {
        let body = validate_body(&input.body)?;
        let (_, comment) = self.comment(slug, id).await?;
        if comment.author_id != actor.id {
            return Err(CommentServiceError::Forbidden(
                "Only the author can edit this comment".to_string(),
            ));
        }

        self.repo
            .update(id, &body)
            .await
            .context("Failed to update comment")?
            .ok_or_else(|| CommentServiceError::NotFound(format!("comment {}", id)))?;
        self.view(id, Some(actor.id)).await
    }

    /// The comment's author, the article's author and editors may delete.
    pub async fn delete(
        &self,
        slug: &str,
        id: i64,
        actor: &User,
    ) -> Result<(), CommentServiceError> {
        let (article, comment) = self.comment(slug, id).await?;
        if !can_delete(actor, &article, &comment) {
            return Err(CommentServiceError::Forbidden(
                "Not allowed to delete this comment".to_string(),
            ));
        }

        self.repo
            .delete(id)
            .await
            .context("Failed to delete comment")?;
        tracing::debug!(comment_id = id, actor_id = actor.id, "Comment deleted");
        Ok(())
    }

    async fn article(&self, slug: &str) -> Result<Article, CommentServiceError> {
        self.articles
            .get_by_slug(slug)
            .await
            .context("Failed to get article by slug")?
            .ok_or_else(|| CommentServiceError::NotFound(format!("article {}", slug)))
    }

    async fn comment(
        &self,
        slug: &str,
        id: i64,
    ) -> Result<(Article, Comment), CommentServiceError> {
        let article = self.article(slug).await?;
        let comment = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get comment")?
            .filter(|c| c.article_id == article.id)
            .ok_or_else(|| CommentServiceError::NotFound(format!("comment {}", id)))?;
        Ok((article, comment))
    }

    async fn view(&self, id: i64, viewer: Option<i64>) -> Result<CommentView, CommentServiceError> {
        self.repo
            .get_view(id, viewer)
            .await
            .context("Failed to load comment")?
            .ok_or_else(|| CommentServiceError::NotFound(format!("comment {}", id)))
    }
}

fn can_delete(actor: &User, article: &Article, comment: &Comment) -> bool {
    actor.id == comment.author_id || actor.can_edit(article.author_id)
}

fn validate_body(body: &str) -> Result<String, CommentServiceError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(CommentServiceError::ValidationError(
            "Comment cannot be empty".to_string(),
        ));
    }
    if body.chars().count() > MAX_COMMENT_LEN {
        return Err(CommentServiceError::ValidationError(format!(
            "Comment cannot exceed {} characters",
            MAX_COMMENT_LEN
        )));
    }
    Ok(body.to_string())
}
