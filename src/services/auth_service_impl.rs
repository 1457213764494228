//! `SeaORM` implementation of the `AuthService` trait.

use crate::config::SecurityConfig;
use crate::db::{Store, User};
use crate::domain::{Action, FieldErrors, Permission, REQUIRED, Resource};
use crate::services::auth_service::{AuthError, AuthService, LoginResult, PasswordChange};
use async_trait::async_trait;
use tracing::info;

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<LoginResult, AuthError> {
        let mut errors = FieldErrors::new();
        let username = errors.require("username", username);
        let password = errors.require("password", password);
        let (Some(username), Some(password)) = (username, password) else {
            return Err(AuthError::Validation(errors));
        };

        let Some(user) = self
            .store
            .user_repo()
            .verify_credentials(username, password)
            .await?
        else {
            metrics::counter!("logins_total", "outcome" => "invalid_credentials").increment(1);
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_active {
            metrics::counter!("logins_total", "outcome" => "not_activated").increment(1);
            return Err(AuthError::NotActivated);
        }

        let token = self.store.token_repo().get_or_create(user.id).await?;
        self.store.user_repo().touch_last_login(user.id).await?;

        metrics::counter!("logins_total", "outcome" => "success").increment(1);
        info!(user_id = user.id, "User logged in");

        Ok(LoginResult { token })
    }

    async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let user_id = self
            .store
            .token_repo()
            .user_id_for(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::InactiveUser)?;

        if !user.is_active {
            return Err(AuthError::InactiveUser);
        }

        Ok(user)
    }

    async fn logout(&self, user: &User) -> Result<(), AuthError> {
        self.store.token_repo().delete_for_user(user.id).await?;
        info!(user_id = user.id, "User logged out");
        Ok(())
    }

    async fn change_password(
        &self,
        caller: &User,
        request: PasswordChange,
    ) -> Result<(), AuthError> {
        let mut errors = FieldErrors::new();
        let Some(new_password) = errors.require("new_password", request.new_password.as_deref())
        else {
            return Err(AuthError::Validation(errors));
        };

        let privileged = self
            .store
            .user_has_permission(caller, Permission::new(Resource::User, Action::Change))
            .await?;

        let named = request
            .username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        let repo = self.store.user_repo();

        let target = if privileged {
            match named {
                Some(name) => {
                    repo.get_by_username(name)
                        .await?
                        .ok_or(AuthError::UserNotFound)?
                        .id
                }
                None => caller.id,
            }
        } else {
            if named.is_some_and(|name| caller.username.as_deref() != Some(name)) {
                return Err(AuthError::PermissionDenied);
            }

            let old_password = request
                .old_password
                .as_deref()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| FieldErrors::single("old_password", REQUIRED))?;

            if !repo.verify_password(caller.id, old_password).await? {
                return Err(AuthError::InvalidCredentials);
            }

            caller.id
        };

        if !repo
            .update_password(target, new_password, &self.security)
            .await?
        {
            return Err(AuthError::UserNotFound);
        }

        info!(user_id = target, changed_by = caller.id, "Password changed");

        Ok(())
    }
}
