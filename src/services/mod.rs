//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories:
//! - Validation and permission checks
//! - Slugs, Markdown rendering, password hashing
//! - Light caching on top of the repositories

pub mod article;
pub mod comment;
pub mod markdown;
pub mod password;
pub mod profile;
pub mod rate_limiter;
pub mod tag;
pub mod user;

pub use article::{generate_slug, ArticleService, ArticleServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use markdown::{excerpt, MarkdownRenderer};
pub use password::{hash_password, verify_password};
pub use profile::{ProfileService, ProfileServiceError};
pub use rate_limiter::LoginRateLimiter;
pub use tag::{generate_tag_slug, TagService, TagServiceError};
pub use user::{LoginInput, UserService, UserServiceError};
