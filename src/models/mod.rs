//! Data models
//!
//! Stored entities (User, Session, Article, Tag, Comment), the denormalized
//! views handed to the API (ArticleView, CommentView, Profile) and the input
//! and pagination types shared by services and storage.

mod article;
mod comment;
mod profile;
mod session;
mod tag;
mod user;

pub use article::{
    Article, ArticleQuery, ArticleView, CreateArticleInput, ListParams, PagedResult,
    UpdateArticleInput,
};
pub use comment::{Comment, CommentView, CreateCommentInput};
pub use profile::{FollowStats, Profile};
pub use session::Session;
pub use tag::{Tag, TagWithCount};
pub use user::{avatar_for, gravatar_url, CreateUserInput, UpdateUserInput, User, UserRole, UserStatus};
