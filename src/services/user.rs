//! User service
//!
//! Registration, login/logout, session validation and account edits.
//! The first account ever registered becomes the admin.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, UpdateUserInput, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::Duration;
use std::sync::Arc;

/// Default session lifetime in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

const MIN_PASSWORD_LEN: usize = 6;
const MAX_USERNAME_LEN: usize = 50;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Account is banned")]
    Banned,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Credentials for login; the identifier may be a username or an email.
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days,
        }
    }

    pub fn session_expiration_days(&self) -> i64 {
        self.session_expiration_days
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a blank username, malformed email or short password
    /// - `UserExists` if the username or email is taken
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let input = CreateUserInput {
            username: input.username.trim().to_string(),
            email: input.email.trim().to_string(),
            password: input.password,
        };
        validate_username(&input.username)?;
        validate_email(&input.email)?;
        validate_password(&input.password)?;

        self.ensure_username_free(&input.username, None).await?;
        self.ensure_email_free(&input.email, None).await?;

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Author
        };

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = User::new(input.username, input.email, password_hash, role);

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, username = %created.username, role = %created.role, "User registered");
        Ok(created)
    }

    /// Check credentials and open a new session.
    pub async fn login(&self, input: LoginInput) -> Result<(User, Session), UserServiceError> {
        let invalid =
            || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .find_user_by_username_or_email(input.username_or_email.trim())
            .await?
            .ok_or_else(invalid)?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            return Err(invalid());
        }

        if user.is_banned() {
            return Err(UserServiceError::Banned);
        }

        let session = self.start_session(user.id).await?;
        tracing::debug!(user_id = user.id, "Session opened");
        Ok((user, session))
    }

    /// Account key for failed-login accounting: the username when
    /// `identifier` names a user by username or email, else `identifier`.
    pub async fn login_key(&self, identifier: &str) -> Result<String, UserServiceError> {
        let identifier = identifier.trim();
        Ok(match self.find_user_by_username_or_email(identifier).await? {
            Some(user) => user.username,
            None => identifier.to_string(),
        })
    }

    /// Invalidate a session. Unknown tokens are ignored.
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?)
    }

    /// The user behind a session token, or `None` for unknown and expired
    /// tokens. Expired sessions are deleted on sight.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user)
    }

    /// Apply profile edits. Username and email stay unique; empty strings
    /// clear display name, bio and image.
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: UpdateUserInput,
    ) -> Result<User, UserServiceError> {
        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)?;

        if !input.has_changes() {
            return Ok(user);
        }

        if let Some(username) = input.username {
            let username = username.trim().to_string();
            validate_username(&username)?;
            if username != user.username {
                self.ensure_username_free(&username, Some(user.id)).await?;
                user.username = username;
            }
        }
        if let Some(email) = input.email {
            let email = email.trim().to_string();
            validate_email(&email)?;
            if email != user.email {
                self.ensure_email_free(&email, Some(user.id)).await?;
                user.email = email;
            }
        }
        if let Some(display_name) = input.display_name {
            user.display_name = non_empty(display_name);
        }
        if let Some(bio) = input.bio {
            user.bio = non_empty(bio);
        }
        if let Some(image) = input.image {
            user.image = non_empty(image);
        }

        Ok(self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?)
    }

    /// Replace the password after checking the current one. Every other
    /// session of the user is revoked; `keep_session` survives.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
        keep_session: Option<&str>,
    ) -> Result<(), UserServiceError> {
        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)?;

        if !verify_password(current_password, &user.password_hash)
            .context("Failed to verify password")?
        {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }
        validate_password(new_password)?;

        user.password_hash = hash_password(new_password).context("Failed to hash password")?;
        self.user_repo
            .update(&user)
            .await
            .context("Failed to update password")?;

        let kept = match keep_session {
            Some(token) => self
                .session_repo
                .get_by_id(token)
                .await
                .context("Failed to get session")?
                .filter(|s| s.user_id == user_id),
            None => None,
        };
        self.session_repo
            .delete_by_user(user_id)
            .await
            .context("Failed to revoke sessions")?;
        if let Some(session) = kept {
            self.session_repo
                .create(&session)
                .await
                .context("Failed to restore current session")?;
        }

        tracing::info!(user_id, "Password changed, other sessions revoked");
        Ok(())
    }

    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Delete every expired session; returns how many were removed.
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    /// Issue a session for an already authenticated user, e.g. right after
    /// registration.
    pub async fn start_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let session = Session::issue(user_id, Duration::days(self.session_expiration_days));
        Ok(self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn find_user_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self.get_by_username(username_or_email).await? {
            return Ok(Some(user));
        }
        Ok(self
            .user_repo
            .get_by_email(username_or_email)
            .await
            .context("Failed to get user by email")?)
    }

    async fn ensure_username_free(
        &self,
        username: &str,
        owner: Option<i64>,
    ) -> Result<(), UserServiceError> {
        match self.get_by_username(username).await? {
            Some(existing) if Some(existing.id) != owner => Err(UserServiceError::UserExists(
                format!("Username '{}' is already taken", username),
            )),
            _ => Ok(()),
        }
    }

    async fn ensure_email_free(
        &self,
        email: &str,
        owner: Option<i64>,
    ) -> Result<(), UserServiceError> {
        let existing = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?;
        match existing {
            Some(existing) if Some(existing.id) != owner => Err(UserServiceError::UserExists(
                format!("Email '{}' is already registered", email),
            )),
            _ => Ok(()),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn validate_username(username: &str) -> Result<(), UserServiceError> {
    if username.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Username cannot be empty".to_string(),
        ));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(UserServiceError::ValidationError(format!(
            "Username cannot exceed {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(UserServiceError::ValidationError(
            "Username may only contain letters, digits, '_', '-' and '.'".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), UserServiceError> {
    if email.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Email cannot be empty".to_string(),
        ));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        )),
    }
}

fn validate_password(password: &str) -> Result<(), UserServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserServiceError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
