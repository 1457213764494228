//! Domain service for authentication.
//!
//! Handles login, token authentication, logout and password changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::User;
use crate::domain::FieldErrors;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("user is not activated yet")]
    NotActivated,

    #[error("Invalid token.")]
    InvalidToken,

    #[error("User inactive or deleted.")]
    InactiveUser,

    #[error("permission denied")]
    PermissionDenied,

    #[error("user not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<FieldErrors> for AuthError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Login result containing the caller's token.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordChange {
    /// Target account; only privileged callers may name someone else.
    pub username: Option<String>,
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials, then the active flag, and returns the user's
    /// single token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown user or wrong
    /// password and [`AuthError::NotActivated`] for a correct password on an
    /// inactive account.
    async fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<LoginResult, AuthError>;

    /// Resolves a token key to its active owner.
    async fn authenticate(&self, token: &str) -> Result<User, AuthError>;

    /// Destroys the caller's token.
    async fn logout(&self, user: &User) -> Result<(), AuthError>;

    /// Changes a password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::PermissionDenied`] when an unprivileged caller
    /// names another user and [`AuthError::InvalidCredentials`] when the old
    /// password does not match.
    async fn change_password(&self, caller: &User, request: PasswordChange)
    -> Result<(), AuthError>;
}
