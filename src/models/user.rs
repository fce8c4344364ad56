//! User model
//!
//! Registered accounts, their roles and the inputs used to create or edit them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered user.
///
/// The role decides what the user may change besides their own content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Unique, used in profile URLs
    pub username: String,
    /// Unique
    pub email: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    /// Avatar URL chosen by the user
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User. The password must already be hashed.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the store
            username,
            email,
            password_hash,
            role,
            status: UserStatus::Active,
            display_name: None,
            bio: None,
            image: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins count as editors
    pub fn is_editor(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Editor)
    }

    /// Admins and editors can edit anything, authors only their own content.
    pub fn can_edit(&self, author_id: i64) -> bool {
        self.is_editor() || self.id == author_id
    }

    pub fn is_banned(&self) -> bool {
        self.status == UserStatus::Banned
    }

    /// The user's own image, or a Gravatar derived from the email.
    pub fn avatar_url(&self) -> String {
        avatar_for(self.image.as_deref(), &self.email)
    }
}

/// Avatar for a stored image column and email
pub fn avatar_for(image: Option<&str>, email: &str) -> String {
    match image {
        Some(image) if !image.is_empty() => image.to_string(),
        _ => gravatar_url(email),
    }
}

/// Gravatar URL for an email address
pub fn gravatar_url(email: &str) -> String {
    let hash = format!("{:x}", md5::compute(email.trim().to_lowercase()));
    format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Editor,
    #[default]
    Author,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Editor => write!(f, "editor"),
            UserRole::Author => write!(f, "author"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "editor" => Ok(UserRole::Editor),
            "author" => Ok(UserRole::Author),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Account state. Banned users cannot log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Banned,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Banned => write!(f, "banned"),
        }
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "banned" => Ok(UserStatus::Banned),
            _ => Err(anyhow::anyhow!("Invalid user status: {}", s)),
        }
    }
}

/// Input for registering a user (plaintext password)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Profile fields a user may change on their own account.
///
/// `None` leaves a field untouched; an empty string clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl UpdateUserInput {
    pub fn has_changes(&self) -> bool {
        self.username.is_some()
            || self.email.is_some()
            || self.display_name.is_some()
            || self.bio.is_some()
            || self.image.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole, id: i64) -> User {
        let mut user = User::new(
            format!("user{}", id),
            format!("user{}@example.com", id),
            "hash".to_string(),
            role,
        );
        user.id = id;
        user
    }

    #[test]
    fn test_user_new_defaults() {
        let user = User::new(
            "testuser".to_string(),
            "test@example.com".to_string(),
            "hashed".to_string(),
            UserRole::Author,
        );

        assert_eq!(user.id, 0);
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.display_name.is_none());
        assert!(!user.is_banned());
    }

    #[test]
    fn test_user_can_edit() {
        let admin = user(UserRole::Admin, 1);
        let editor = user(UserRole::Editor, 2);
        let author = user(UserRole::Author, 3);

        assert!(admin.can_edit(999));
        assert!(editor.can_edit(999));
        assert!(author.can_edit(3));
        assert!(!author.can_edit(1));
    }

    #[test]
    fn test_avatar_falls_back_to_gravatar() {
        let mut u = user(UserRole::Author, 1);
        assert!(u.avatar_url().starts_with("https://www.gravatar.com/avatar/"));

        u.image = Some(String::new());
        assert!(u.avatar_url().starts_with("https://www.gravatar.com/avatar/"));

        u.image = Some("https://img.example/me.png".to_string());
        assert_eq!(u.avatar_url(), "https://img.example/me.png");
    }

    #[test]
    fn test_gravatar_normalizes_email() {
        assert_eq!(
            gravatar_url("  Someone@Example.com "),
            gravatar_url("someone@example.com")
        );
    }

    #[test]
    fn test_role_and_status_parse() {
        assert_eq!(UserRole::from_str("ADMIN").unwrap(), UserRole::Admin);
        assert_eq!(UserRole::from_str("author").unwrap(), UserRole::Author);
        assert!(UserRole::from_str("owner").is_err());
        assert_eq!(UserStatus::from_str("Banned").unwrap(), UserStatus::Banned);
        assert_eq!(UserRole::Editor.to_string(), "editor");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn role() -> impl Strategy<Value = UserRole> {
            prop_oneof![
                Just(UserRole::Admin),
                Just(UserRole::Editor),
                Just(UserRole::Author),
            ]
        }

        proptest! {
            #[test]
            fn owners_and_editors_can_edit(role in role(), id in 1i64..1000, author_id in 1i64..1000) {
                let u = user(role, id);
                prop_assert!(u.can_edit(id));
                prop_assert_eq!(u.can_edit(author_id), id == author_id || role != UserRole::Author);
            }
        }
    }
}
