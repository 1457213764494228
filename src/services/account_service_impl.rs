//! `SeaORM` implementation of the `AccountService` trait.

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{AccountsConfig, SecurityConfig};
use crate::db::{NewUser, Store, User, UserChanges, unique_violation};
use crate::domain::{BLANK, FieldErrors};
use crate::services::account_service::{
    AccountError, AccountService, AccountUpdate, CreatedAccount, DUPLICATE_MOBILE,
    DUPLICATE_USERNAME, INVALID_EMAIL, INVALID_MOBILE, INVALID_USERNAME, NewAccount,
    Registration,
};
use crate::services::verification::{IssuedCode, VerificationService};

const USERNAME_MAX_LENGTH: usize = 150;
const NAME_MAX_LENGTH: usize = 150;
/// Letters, digits and `@ . + - _`, Unicode letters included.
const USERNAME_PATTERN: &str = r"^[\w.@+-]+\z";

pub struct SeaOrmAccountService {
    store: Store,
    verification: Arc<VerificationService>,
    accounts: AccountsConfig,
    security: SecurityConfig,
    mobile_pattern: Regex,
    username_pattern: Regex,
}

impl SeaOrmAccountService {
    pub fn new(
        store: Store,
        verification: Arc<VerificationService>,
        accounts: AccountsConfig,
        security: SecurityConfig,
    ) -> anyhow::Result<Self> {
        let mobile_pattern = Regex::new(&accounts.mobile_pattern)?;
        let username_pattern = Regex::new(USERNAME_PATTERN)?;
        Ok(Self {
            store,
            verification,
            accounts,
            security,
            mobile_pattern,
            username_pattern,
        })
    }

    fn check_username(&self, errors: &mut FieldErrors, username: &str) {
        errors.max_length("username", username, USERNAME_MAX_LENGTH);
        if !self.username_pattern.is_match(username) {
            errors.add("username", INVALID_USERNAME);
        }
    }

    fn check_mobile(&self, errors: &mut FieldErrors, mobile: &str) {
        errors.max_length("mobile", mobile, self.accounts.mobile_length);
        if !self.mobile_pattern.is_match(mobile) {
            errors.add("mobile", INVALID_MOBILE);
        }
    }

    /// Field checks shared by sign-up and administrative creation. Returns
    /// the insert payload only when every field is acceptable.
    async fn validate_registration(
        &self,
        registration: Registration,
    ) -> Result<NewUser, AccountError> {
        let mut errors = FieldErrors::new();

        // Username is optional: absent and blank both store NULL.
        let username = registration
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());
        let mobile = errors.require("mobile", registration.mobile.as_deref());
        let password = errors.require("password", registration.password.as_deref());

        if let Some(username) = username {
            self.check_username(&mut errors, username);
        }
        if let Some(mobile) = mobile {
            self.check_mobile(&mut errors, mobile);
        }

        let email = registration.email.clone().unwrap_or_default();
        check_email(&mut errors, &email);

        let first_name = registration.first_name.clone().unwrap_or_default();
        let last_name = registration.last_name.clone().unwrap_or_default();
        errors.max_length("first_name", &first_name, NAME_MAX_LENGTH);
        errors.max_length("last_name", &last_name, NAME_MAX_LENGTH);

        let repo = self.store.user_repo();
        if let Some(username) = username
            && !errors.contains("username")
            && repo.username_taken(username, None).await?
        {
            errors.add("username", DUPLICATE_USERNAME);
        }
        if let Some(mobile) = mobile
            && !errors.contains("mobile")
            && repo.mobile_taken(mobile, None).await?
        {
            errors.add("mobile", DUPLICATE_MOBILE);
        }

        let (Some(mobile), Some(password)) = (mobile, password) else {
            return Err(AccountError::Validation(errors));
        };
        errors.into_result()?;

        Ok(NewUser {
            username: username.map(str::to_string),
            mobile: mobile.to_string(),
            email,
            password: password.to_string(),
            first_name,
            last_name,
            ..NewUser::default()
        })
    }

    async fn check_memberships(
        &self,
        errors: &mut FieldErrors,
        groups: &[i32],
        permissions: &[i32],
    ) -> Result<(), AccountError> {
        let found = self.store.group_repo().get_many(groups).await?;
        for id in groups {
            if !found.iter().any(|g| g.id == *id) {
                errors.add("groups", format!("Invalid pk \"{id}\" - object does not exist."));
            }
        }

        for id in self.store.permission_repo().unknown_ids(permissions).await? {
            errors.add(
                "permissions",
                format!("Invalid pk \"{id}\" - object does not exist."),
            );
        }

        Ok(())
    }

    /// Insert plus the post-creation pipeline. Extra memberships are applied
    /// before the code is issued. If any step after the insert fails the row
    /// is removed again, so a retry does not trip over its own username.
    async fn create(
        &self,
        new_user: NewUser,
        groups: &[i32],
        permissions: &[i32],
    ) -> Result<CreatedAccount, AccountError> {
        let user = match self.store.user_repo().create(new_user, &self.security).await {
            Ok(user) => user,
            Err(e) => return Err(map_unique_violation(e)),
        };

        let code = match self.run_pipeline(&user, groups, permissions).await {
            Ok(code) => code,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "Account creation failed, discarding user");
                if let Err(cleanup) = self.store.user_repo().delete(user.id).await {
                    error!(user_id = user.id, error = %cleanup, "Failed to discard user");
                }
                return Err(e);
            }
        };

        metrics::counter!("accounts_registered_total").increment(1);
        info!(user_id = user.id, username = user.display_name(), "Account created");

        Ok(CreatedAccount { user, code })
    }

    async fn run_pipeline(
        &self,
        user: &User,
        groups: &[i32],
        permissions: &[i32],
    ) -> Result<IssuedCode, AccountError> {
        self.attach_default_group(user).await?;

        let repo = self.store.user_repo();
        if !groups.is_empty() {
            let mut ids = repo.group_ids(user.id).await?;
            ids.extend_from_slice(groups);
            repo.set_groups(user.id, &ids).await?;
        }
        if !permissions.is_empty() {
            repo.set_permissions(user.id, permissions).await?;
        }

        Ok(self.verification.issue(user).await?)
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.is_empty() {
        return;
    }
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        errors.add("email", INVALID_EMAIL);
    }
}

/// Turns a unique-index violation that raced past the pre-checks into the
/// same field error the pre-check would have produced.
fn map_unique_violation(err: anyhow::Error) -> AccountError {
    match unique_violation(&err) {
        Some(message) if message.contains("users.username") => {
            FieldErrors::single("username", DUPLICATE_USERNAME).into()
        }
        Some(message) if message.contains("users.mobile") => {
            FieldErrors::single("mobile", DUPLICATE_MOBILE).into()
        }
        _ => AccountError::from(err),
    }
}

#[async_trait]
impl AccountService for SeaOrmAccountService {
    async fn register(&self, registration: Registration) -> Result<CreatedAccount, AccountError> {
        let new_user = self.validate_registration(registration).await?;
        self.create(new_user, &[], &[]).await
    }

    async fn create_account(&self, account: NewAccount) -> Result<CreatedAccount, AccountError> {
        let mut errors = FieldErrors::new();
        self.check_memberships(&mut errors, &account.groups, &account.permissions)
            .await?;

        let new_user = match self.validate_registration(account.registration).await {
            Ok(new_user) if errors.is_empty() => new_user,
            Ok(_) => return Err(AccountError::Validation(errors)),
            Err(AccountError::Validation(mut field_errors)) => {
                for field in ["groups", "permissions"] {
                    for message in errors.get(field).unwrap_or_default() {
                        field_errors.add(field, message.clone());
                    }
                }
                return Err(AccountError::Validation(field_errors));
            }
            Err(e) => return Err(e),
        };

        self.create(
            NewUser {
                is_active: account.is_active,
                is_staff: account.is_staff,
                is_superuser: account.is_superuser,
                ..new_user
            },
            &account.groups,
            &account.permissions,
        )
        .await
    }

    async fn attach_default_group(&self, user: &User) -> Result<bool, AccountError> {
        let groups = self.store.group_repo();
        let group = groups.get_or_create(&self.accounts.default_group).await?;
        let added = groups.add_member(group.id, user.id).await?;
        if added {
            info!(user_id = user.id, group = %group.name, "Added user to default group");
        }
        Ok(added)
    }

    async fn update_account(&self, id: i32, update: AccountUpdate) -> Result<User, AccountError> {
        let repo = self.store.user_repo();
        if repo.get_by_id(id).await?.is_none() {
            return Err(AccountError::UserNotFound);
        }

        let mut errors = FieldErrors::new();

        if let Some(username) = update.username.as_deref() {
            if username.trim().is_empty() {
                errors.add("username", BLANK);
            } else {
                self.check_username(&mut errors, username);
                if !errors.contains("username") && repo.username_taken(username, Some(id)).await? {
                    errors.add("username", DUPLICATE_USERNAME);
                }
            }
        }
        if let Some(mobile) = update.mobile.as_deref() {
            if mobile.trim().is_empty() {
                errors.add("mobile", BLANK);
            } else {
                self.check_mobile(&mut errors, mobile);
                if !errors.contains("mobile") && repo.mobile_taken(mobile, Some(id)).await? {
                    errors.add("mobile", DUPLICATE_MOBILE);
                }
            }
        }
        if let Some(email) = update.email.as_deref() {
            check_email(&mut errors, email);
        }
        for (field, value) in [
            ("first_name", update.first_name.as_deref()),
            ("last_name", update.last_name.as_deref()),
        ] {
            if let Some(value) = value {
                errors.max_length(field, value, NAME_MAX_LENGTH);
            }
        }

        self.check_memberships(
            &mut errors,
            update.groups.as_deref().unwrap_or_default(),
            update.permissions.as_deref().unwrap_or_default(),
        )
        .await?;

        errors.into_result()?;

        let changes = UserChanges {
            username: update.username,
            mobile: update.mobile,
            email: update.email,
            first_name: update.first_name,
            last_name: update.last_name,
            image: update.image,
            is_active: update.is_active,
            is_staff: update.is_staff,
            is_superuser: update.is_superuser,
        };

        let user = match repo.update(id, changes).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AccountError::UserNotFound),
            Err(e) => return Err(map_unique_violation(e)),
        };

        if let Some(groups) = update.groups {
            repo.set_groups(id, &groups).await?;
        }
        if let Some(permissions) = update.permissions {
            repo.set_permissions(id, &permissions).await?;
        }

        Ok(user)
    }

    async fn reissue_code(&self, username: &str) -> Result<IssuedCode, AccountError> {
        let user = self
            .store
            .get_user_by_username(username)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        if user.is_active {
            return Err(FieldErrors::single("username", "user is already active.").into());
        }

        Ok(self.verification.issue(&user).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, VerificationConfig};
    use crate::domain::UserId;
    use crate::services::code_cache::{CodeCache, MemoryCodeCache};
    use std::time::Duration;
    use crate::services::notifier::LogNotifier;
    use crate::services::verification::CodeCipher;

    /// Refuses every write, as a database-backed cache would on a full disk.
    struct BrokenCache;

    #[async_trait]
    impl CodeCache for BrokenCache {
        async fn put(&self, _key: &str, _user_id: UserId, _ttl: Duration) -> anyhow::Result<()> {
            anyhow::bail!("disk I/O error")
        }

        async fn get(&self, _key: &str) -> anyhow::Result<Option<UserId>> {
            Ok(None)
        }

        async fn take(&self, _key: &str) -> anyhow::Result<Option<UserId>> {
            Ok(None)
        }

        async fn delete(&self, _key: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn service_on(store: &Store, cache: Arc<dyn CodeCache>) -> SeaOrmAccountService {
        let verification = Arc::new(VerificationService::new(
            store.clone(),
            cache,
            Arc::new(LogNotifier),
            CodeCipher::ephemeral(),
            VerificationConfig::default(),
        ));
        let security = SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
        };
        SeaOrmAccountService::new(store.clone(), verification, Config::default().accounts, security)
            .unwrap()
    }

    async fn service() -> (Store, SeaOrmAccountService) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let service = service_on(&store, Arc::new(MemoryCodeCache::new()));
        (store, service)
    }

    fn registration(username: &str, mobile: &str) -> Registration {
        Registration {
            username: Some(username.to_string()),
            mobile: Some(mobile.to_string()),
            password: Some("user-password1".to_string()),
            ..Registration::default()
        }
    }

    #[tokio::test]
    async fn default_group_attachment_is_idempotent() {
        let (store, service) = service().await;
        let created = service.register(registration("user1", "123")).await.unwrap();

        assert!(!service.attach_default_group(&created.user).await.unwrap());

        let group = store.group_repo().get_by_name("users").await.unwrap().unwrap();
        let rows = store
            .group_repo()
            .member_count(group.id, created.user.id)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn failed_code_issue_discards_the_new_user() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let broken = service_on(&store, Arc::new(BrokenCache));

        let err = broken.register(registration("user1", "123")).await.unwrap_err();
        assert!(matches!(err, AccountError::Internal(_)));
        assert!(store.get_user_by_username("user1").await.unwrap().is_none());

        // Nothing is left behind to collide with a retry.
        let working = service_on(&store, Arc::new(MemoryCodeCache::new()));
        let created = working.register(registration("user1", "123")).await.unwrap();
        assert_eq!(created.user.username.as_deref(), Some("user1"));
    }

    #[tokio::test]
    async fn both_duplicates_reported_together() {
        let (_store, service) = service().await;
        service.register(registration("user1", "123")).await.unwrap();

        let Err(AccountError::Validation(errors)) =
            service.register(registration("user1", "123")).await
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("username").unwrap(), [DUPLICATE_USERNAME]);
        assert_eq!(errors.get("mobile").unwrap(), [DUPLICATE_MOBILE]);
    }

    #[tokio::test]
    async fn mobile_format_and_length_are_checked() {
        let (_store, service) = service().await;

        let Err(AccountError::Validation(errors)) = service
            .register(registration("user1", "12345678901234567890"))
            .await
        else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.get("mobile").unwrap(),
            ["Ensure this field has no more than 15 characters."]
        );

        let Err(AccountError::Validation(errors)) =
            service.register(registration("user1", "12-34")).await
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("mobile").unwrap(), [INVALID_MOBILE]);
    }

    #[tokio::test]
    async fn username_is_optional() {
        let (_store, service) = service().await;

        let created = service
            .register(Registration {
                username: None,
                ..registration("", "123")
            })
            .await
            .unwrap();
        assert_eq!(created.user.username, None);

        // Blank is stored as NULL too, so it never collides on the unique index.
        let created = service.register(registration("  ", "456")).await.unwrap();
        assert_eq!(created.user.username, None);
    }

    #[tokio::test]
    async fn username_characters_are_checked() {
        let (_store, service) = service().await;

        let Err(AccountError::Validation(errors)) =
            service.register(registration("bad name!", "123")).await
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("username").unwrap(), [INVALID_USERNAME]);

        let created = service
            .register(registration("nörd.user+1@x-y_z", "123"))
            .await
            .unwrap();

        let Err(AccountError::Validation(errors)) = service
            .update_account(
                created.user.id,
                AccountUpdate {
                    username: Some("has space".to_string()),
                    ..AccountUpdate::default()
                },
            )
            .await
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("username").unwrap(), [INVALID_USERNAME]);
    }

    #[tokio::test]
    async fn unique_violation_maps_back_to_field_error() {
        let (store, _service) = service().await;
        let security = SecurityConfig::default();
        let new_user = NewUser {
            username: Some("a".into()),
            mobile: "555".into(),
            password: "pw".into(),
            ..NewUser::default()
        };
        store.user_repo().create(new_user.clone(), &security).await.unwrap();

        let err = store
            .user_repo()
            .create(
                NewUser {
                    username: Some("b".into()),
                    ..new_user
                },
                &security,
            )
            .await
            .unwrap_err();

        let AccountError::Validation(errors) = map_unique_violation(err) else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("mobile").unwrap(), [DUPLICATE_MOBILE]);
    }

    #[test]
    fn email_shape() {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, "");
        check_email(&mut errors, "someone@example.com");
        assert!(errors.is_empty());
        check_email(&mut errors, "nope");
        assert_eq!(errors.get("email").unwrap(), [INVALID_EMAIL]);
    }
}
