//! Shared API response types
//!
//! Response envelopes used by several endpoints and the mapping from
//! service errors to [`ApiError`] codes.

use serde::{Deserialize, Serialize};

use crate::api::middleware::ApiError;
use crate::models::{PagedResult, User};
use crate::services::{
    ArticleServiceError, CommentServiceError, ProfileServiceError, TagServiceError,
    UserServiceError,
};

// ============================================================================
// Response Types
// ============================================================================

/// The signed-in user's own account, email included
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub image: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            image: user.avatar_url(),
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role.to_string(),
            display_name: user.display_name,
            bio: user.bio,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// One page of items plus paging metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> From<PagedResult<T>> for PaginatedResponse<T> {
    fn from(result: PagedResult<T>) -> Self {
        let total_pages = result.total_pages();
        Self {
            total: result.total,
            page: result.page,
            page_size: result.per_page,
            total_pages,
            items: result.items,
        }
    }
}

// ============================================================================
// Service Error Mapping
// ============================================================================

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::Banned => ApiError::new("USER_BANNED", "Account is banned"),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<ProfileServiceError> for ApiError {
    fn from(err: ProfileServiceError) -> Self {
        match err {
            ProfileServiceError::NotFound => ApiError::not_found("Profile not found"),
            ProfileServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ProfileServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<ArticleServiceError> for ApiError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::NotFound(slug) => {
                ApiError::not_found(format!("Article not found: {}", slug))
            }
            ArticleServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ArticleServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ArticleServiceError::Conflict(msg) => ApiError::conflict(msg),
            ArticleServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound(what) => {
                ApiError::not_found(format!("Not found: {}", what))
            }
            CommentServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            CommentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CommentServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            TagServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}
