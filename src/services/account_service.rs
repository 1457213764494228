//! Domain service for account creation and maintenance.
//!
//! Every account, whether self-registered, created by an administrator or
//! bootstrapped from the CLI, goes through the same pipeline: validate,
//! insert, join the default group, issue a verification code.

use serde::Deserialize;
use thiserror::Error;

use crate::db::User;
use crate::domain::FieldErrors;
use crate::services::verification::{IssuedCode, VerificationError};

pub const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
pub const DUPLICATE_MOBILE: &str = "user with this mobile already exists.";
pub const INVALID_MOBILE: &str = "Enter a valid mobile number.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("user not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AccountError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<FieldErrors> for AccountError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<VerificationError> for AccountError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::UserNotFound => Self::UserNotFound,
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Public sign-up payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    pub username: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Administrative creation: a registration plus flags and memberships.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    #[serde(flatten)]
    pub registration: Registration,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub groups: Vec<i32>,
    #[serde(default)]
    pub permissions: Vec<i32>,
}

/// Partial account update. Profile fields are open to the owner; the rest
/// only to administrators.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    pub username: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
    pub groups: Option<Vec<i32>>,
    pub permissions: Option<Vec<i32>>,
}

impl AccountUpdate {
    /// Drops everything but the profile fields.
    #[must_use]
    pub fn profile_only(self) -> Self {
        Self {
            username: self.username,
            mobile: self.mobile,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            image: self.image,
            ..Self::default()
        }
    }
}

/// A created account and the code its owner was sent.
#[derive(Debug, Clone)]
pub struct CreatedAccount {
    pub user: User,
    pub code: IssuedCode,
}

/// Domain service trait for account management.
#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    /// Self-registration. The account starts inactive.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Validation`] with every field problem found,
    /// including duplicate username and mobile together.
    async fn register(&self, registration: Registration) -> Result<CreatedAccount, AccountError>;

    /// Administrative creation through the same pipeline.
    async fn create_account(&self, account: NewAccount) -> Result<CreatedAccount, AccountError>;

    /// Puts `user` in the configured default group. Returns `true` only when
    /// a membership was added.
    async fn attach_default_group(&self, user: &User) -> Result<bool, AccountError>;

    async fn update_account(&self, id: i32, update: AccountUpdate) -> Result<User, AccountError>;

    /// Issues a fresh code for an existing inactive account.
    async fn reissue_code(&self, username: &str) -> Result<IssuedCode, AccountError>;
}
