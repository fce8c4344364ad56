//! Public profile view of a user

use serde::{Deserialize, Serialize};

use super::User;

/// Follow statistics of one user, as seen by a viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowStats {
    pub follower_count: i64,
    pub following_count: i64,
    /// Whether the viewer follows this user; false for anonymous viewers
    pub following: bool,
}

/// What other users see of an account. Never carries the email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub image: String,
    pub following: bool,
    pub follower_count: i64,
    pub following_count: i64,
}

impl Profile {
    pub fn from_user(user: &User, stats: FollowStats) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            bio: user.bio.clone(),
            image: user.avatar_url(),
            following: stats.following,
            follower_count: stats.follower_count,
            following_count: stats.following_count,
        }
    }
}
