use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait, sea_query::OnConflict,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::task;

use crate::config::SecurityConfig;
use crate::domain::Permission;
use crate::entities::{
    group_permissions, permissions, prelude::*, user_groups, user_permissions, users,
};

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i32,
    pub username: Option<String>,
    pub mobile: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub image: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub mobile_verified: bool,
    pub email_verified: bool,
    pub last_login: Option<String>,
    pub date_joined: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            mobile: model.mobile,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            image: model.image,
            is_active: model.is_active,
            is_staff: model.is_staff,
            is_superuser: model.is_superuser,
            mobile_verified: model.mobile_verified,
            email_verified: model.email_verified,
            last_login: model.last_login,
            date_joined: model.date_joined,
        }
    }
}

impl User {
    /// Name used in logs; falls back to the mobile number.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.mobile)
    }
}

/// Insert payload; `password` is plaintext and hashed on the way in.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: Option<String>,
    pub mobile: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub username: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_staff: Option<bool>,
    pub is_active: Option<bool>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Inserts a user. Unique violations on `username`/`mobile` surface as a
    /// `DbErr` inside the returned error (see [`crate::db::unique_violation`]).
    pub async fn create(&self, new_user: NewUser, config: &SecurityConfig) -> Result<User> {
        let password = new_user.password.clone();
        let config = config.clone();
        let password_hash = task::spawn_blocking(move || hash_password(&password, Some(&config)))
            .await
            .context("Password hashing task panicked")??;

        let active = users::ActiveModel {
            username: Set(new_user.username),
            mobile: Set(new_user.mobile),
            password_hash: Set(password_hash),
            email: Set(new_user.email),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            image: Set(String::new()),
            is_active: Set(new_user.is_active),
            is_staff: Set(new_user.is_staff),
            is_superuser: Set(new_user.is_superuser),
            mobile_verified: Set(false),
            email_verified: Set(false),
            last_login: Set(None),
            date_joined: Set(crate::db::now()),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_mobile(&self, mobile: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Mobile.eq(mobile))
            .one(&self.conn)
            .await
            .context("Failed to query user by mobile")?;

        Ok(user.map(User::from))
    }

    /// Whether another user already holds `username`.
    pub async fn username_taken(&self, username: &str, exclude: Option<i32>) -> Result<bool> {
        let mut query = Users::find().filter(users::Column::Username.eq(username));
        if let Some(id) = exclude {
            query = query.filter(users::Column::Id.ne(id));
        }
        Ok(query
            .one(&self.conn)
            .await
            .context("Failed to check username")?
            .is_some())
    }

    /// Whether another user already holds `mobile`.
    pub async fn mobile_taken(&self, mobile: &str, exclude: Option<i32>) -> Result<bool> {
        let mut query = Users::find().filter(users::Column::Mobile.eq(mobile));
        if let Some(id) = exclude {
            query = query.filter(users::Column::Id.ne(id));
        }
        Ok(query
            .one(&self.conn)
            .await
            .context("Failed to check mobile")?
            .is_some())
    }

    pub async fn list(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let mut cond = Condition::all();
        if let Some(v) = &filter.username {
            cond = cond.add(users::Column::Username.eq(v.as_str()));
        }
        if let Some(v) = &filter.mobile {
            cond = cond.add(users::Column::Mobile.eq(v.as_str()));
        }
        if let Some(v) = &filter.email {
            cond = cond.add(users::Column::Email.eq(v.as_str()));
        }
        if let Some(v) = &filter.first_name {
            cond = cond.add(users::Column::FirstName.eq(v.as_str()));
        }
        if let Some(v) = &filter.last_name {
            cond = cond.add(users::Column::LastName.eq(v.as_str()));
        }
        if let Some(v) = filter.is_staff {
            cond = cond.add(users::Column::IsStaff.eq(v));
        }
        if let Some(v) = filter.is_active {
            cond = cond.add(users::Column::IsActive.eq(v));
        }

        let rows = Users::find()
            .filter(cond)
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Applies `changes`, returning `None` when the user does not exist.
    pub async fn update(&self, id: i32, changes: UserChanges) -> Result<Option<User>> {
        let Some(user) = Users::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = user.into();
        if let Some(v) = changes.username {
            active.username = Set(Some(v));
        }
        if let Some(v) = changes.mobile {
            active.mobile = Set(v);
        }
        if let Some(v) = changes.email {
            active.email = Set(v);
        }
        if let Some(v) = changes.first_name {
            active.first_name = Set(v);
        }
        if let Some(v) = changes.last_name {
            active.last_name = Set(v);
        }
        if let Some(v) = changes.image {
            active.image = Set(v);
        }
        if let Some(v) = changes.is_active {
            active.is_active = Set(v);
        }
        if let Some(v) = changes.is_staff {
            active.is_staff = Set(v);
        }
        if let Some(v) = changes.is_superuser {
            active.is_superuser = Set(v);
        }

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update user")?;

        Ok(Some(User::from(model)))
    }

    /// Returns `false` when the user does not exist.
    pub async fn set_active(&self, id: i32, is_active: bool) -> Result<bool> {
        let Some(user) = Users::find_by_id(id).one(&self.conn).await? else {
            return Ok(false);
        };

        if user.is_active != is_active {
            let mut active: users::ActiveModel = user.into();
            active.is_active = Set(is_active);
            active.update(&self.conn).await?;
        }

        Ok(true)
    }

    pub async fn touch_last_login(&self, id: i32) -> Result<()> {
        Users::update_many()
            .col_expr(
                users::Column::LastLogin,
                sea_orm::sea_query::Expr::value(crate::db::now()),
            )
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update last_login")?;
        Ok(())
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Users::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;
        Ok(result.rows_affected > 0)
    }

    /// Checks `password` against the stored hash of the user named `username`.
    /// Returns the user only when the password matches.
    ///
    /// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
    /// and would block the async runtime if run directly.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(None);
        };

        if verify_hash(user.password_hash.clone(), password).await? {
            Ok(Some(User::from(user)))
        } else {
            Ok(None)
        }
    }

    pub async fn verify_password(&self, id: i32, password: &str) -> Result<bool> {
        let Some(user) = Users::find_by_id(id).one(&self.conn).await? else {
            return Ok(false);
        };

        verify_hash(user.password_hash, password).await
    }

    /// Re-hashes and stores the password. Returns `false` when the user does
    /// not exist.
    pub async fn update_password(
        &self,
        id: i32,
        new_password: &str,
        config: &SecurityConfig,
    ) -> Result<bool> {
        let Some(user) = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for password update")?
        else {
            return Ok(false);
        };

        let password = new_password.to_string();
        let config = config.clone();
        let new_hash = task::spawn_blocking(move || hash_password(&password, Some(&config)))
            .await
            .context("Password hashing task panicked")??;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(new_hash);
        active.update(&self.conn).await?;

        Ok(true)
    }

    pub async fn group_ids(&self, id: i32) -> Result<Vec<i32>> {
        let rows = UserGroups::find()
            .filter(user_groups::Column::UserId.eq(id))
            .order_by_asc(user_groups::Column::GroupId)
            .all(&self.conn)
            .await
            .context("Failed to query user groups")?;

        Ok(rows.into_iter().map(|r| r.group_id).collect())
    }

    /// Replaces the user's group memberships in one transaction.
    pub async fn set_groups(&self, id: i32, group_ids: &[i32]) -> Result<()> {
        let txn = self.conn.begin().await?;

        UserGroups::delete_many()
            .filter(user_groups::Column::UserId.eq(id))
            .exec(&txn)
            .await
            .context("Failed to clear user groups")?;

        if !group_ids.is_empty() {
            let rows = group_ids.iter().map(|&group_id| user_groups::ActiveModel {
                user_id: Set(id),
                group_id: Set(group_id),
            });

            UserGroups::insert_many(rows)
                .on_conflict(
                    OnConflict::columns([user_groups::Column::UserId, user_groups::Column::GroupId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .context("Failed to set user groups")?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Directly granted permission ids (not those inherited from groups).
    pub async fn permission_ids(&self, id: i32) -> Result<Vec<i32>> {
        let rows = UserPermissions::find()
            .filter(user_permissions::Column::UserId.eq(id))
            .order_by_asc(user_permissions::Column::PermissionId)
            .all(&self.conn)
            .await
            .context("Failed to query user permissions")?;

        Ok(rows.into_iter().map(|r| r.permission_id).collect())
    }

    pub async fn set_permissions(&self, id: i32, permission_ids: &[i32]) -> Result<()> {
        let txn = self.conn.begin().await?;

        UserPermissions::delete_many()
            .filter(user_permissions::Column::UserId.eq(id))
            .exec(&txn)
            .await
            .context("Failed to clear user permissions")?;

        if !permission_ids.is_empty() {
            let rows = permission_ids
                .iter()
                .map(|&permission_id| user_permissions::ActiveModel {
                    user_id: Set(id),
                    permission_id: Set(permission_id),
                });

            UserPermissions::insert_many(rows)
                .on_conflict(
                    OnConflict::columns([
                        user_permissions::Column::UserId,
                        user_permissions::Column::PermissionId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .context("Failed to set user permissions")?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Direct grants plus everything granted to the user's groups.
    pub async fn effective_permissions(&self, id: i32) -> Result<BTreeSet<Permission>> {
        let group_ids = self.group_ids(id).await?;
        let mut permission_ids = self.permission_ids(id).await?;

        if !group_ids.is_empty() {
            let inherited = GroupPermissions::find()
                .filter(group_permissions::Column::GroupId.is_in(group_ids))
                .all(&self.conn)
                .await
                .context("Failed to query group permissions")?;
            permission_ids.extend(inherited.into_iter().map(|r| r.permission_id));
        }

        if permission_ids.is_empty() {
            return Ok(BTreeSet::new());
        }

        let rows = Permissions::find()
            .filter(permissions::Column::Id.is_in(permission_ids))
            .all(&self.conn)
            .await
            .context("Failed to resolve permissions")?;

        Ok(rows
            .iter()
            .filter_map(|p| Permission::from_codename(&p.codename))
            .collect())
    }

    /// Active superusers hold every permission.
    pub async fn has_permission(&self, user: &User, permission: Permission) -> Result<bool> {
        if !user.is_active {
            return Ok(false);
        }
        if user.is_superuser {
            return Ok(true);
        }
        Ok(self
            .effective_permissions(user.id)
            .await?
            .contains(&permission))
    }
}

async fn verify_hash(password_hash: String, password: &str) -> Result<bool> {
    let password = password.to_string();

    // Run CPU-intensive password verification in a blocking task
    task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

        Ok::<bool, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await
    .context("Password verification task panicked")?
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses the argon2 crate defaults.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None, // output length (use default)
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
