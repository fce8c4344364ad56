//! Profile service
//!
//! Public profiles, follow / unfollow by username and follower listings.

use crate::db::repositories::{FollowRepository, UserRepository};
use crate::models::{ListParams, PagedResult, Profile, User};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ProfileServiceError {
    #[error("Profile not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ProfileService {
    users: Arc<dyn UserRepository>,
    follows: Arc<dyn FollowRepository>,
}

impl ProfileService {
    pub fn new(users: Arc<dyn UserRepository>, follows: Arc<dyn FollowRepository>) -> Self {
        Self { users, follows }
    }

    /// Profile of `username` as `viewer` sees it
    pub async fn get_profile(
        &self,
        username: &str,
        viewer: Option<i64>,
    ) -> Result<Profile, ProfileServiceError> {
        let user = self.find(username).await?;
        self.profile_of(&user, viewer).await
    }

    /// Follow `username`. Following twice is a no-op.
    pub async fn follow(
        &self,
        follower_id: i64,
        username: &str,
    ) -> Result<Profile, ProfileServiceError> {
        let followee = self.find(username).await?;
        if followee.id == follower_id {
            return Err(ProfileServiceError::ValidationError(
                "You cannot follow yourself".to_string(),
            ));
        }

        let created = self
            .follows
            .follow(follower_id, followee.id)
            .await
            .context("Failed to follow user")?;
        if created {
            tracing::debug!(follower_id, followee_id = followee.id, "Follow added");
        }
        self.profile_of(&followee, Some(follower_id)).await
    }

    /// Unfollow `username`. Not following is a no-op.
    pub async fn unfollow(
        &self,
        follower_id: i64,
        username: &str,
    ) -> Result<Profile, ProfileServiceError> {
        let followee = self.find(username).await?;
        self.follows
            .unfollow(follower_id, followee.id)
            .await
            .context("Failed to unfollow user")?;
        self.profile_of(&followee, Some(follower_id)).await
    }

    /// Users following `username`, most recent first
    pub async fn followers(
        &self,
        username: &str,
        params: &ListParams,
        viewer: Option<i64>,
    ) -> Result<PagedResult<Profile>, ProfileServiceError> {
        let user = self.find(username).await?;
        let (users, total) = self
            .follows
            .list_followers(user.id, params.offset(), params.limit())
            .await
            .context("Failed to list followers")?;
        self.page_of(users, total, params, viewer).await
    }

    /// Users `username` follows, most recent first
    pub async fn following(
        &self,
        username: &str,
        params: &ListParams,
        viewer: Option<i64>,
    ) -> Result<PagedResult<Profile>, ProfileServiceError> {
        let user = self.find(username).await?;
        let (users, total) = self
            .follows
            .list_following(user.id, params.offset(), params.limit())
            .await
            .context("Failed to list followed users")?;
        self.page_of(users, total, params, viewer).await
    }

    async fn find(&self, username: &str) -> Result<User, ProfileServiceError> {
        self.users
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?
            .ok_or(ProfileServiceError::NotFound)
    }

    async fn profile_of(
        &self,
        user: &User,
        viewer: Option<i64>,
    ) -> Result<Profile, ProfileServiceError> {
        let stats = self
            .follows
            .stats(user.id, viewer)
            .await
            .context("Failed to load follow stats")?;
        Ok(Profile::from_user(user, stats))
    }

    async fn page_of(
        &self,
        users: Vec<User>,
        total: i64,
        params: &ListParams,
        viewer: Option<i64>,
    ) -> Result<PagedResult<Profile>, ProfileServiceError> {
        let mut profiles = Vec::with_capacity(users.len());
        for user in &users {
            profiles.push(self.profile_of(user, viewer).await?);
        }
        Ok(PagedResult::new(profiles, total, params))
    }
}
