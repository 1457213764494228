use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, sea_query::OnConflict,
};

use crate::entities::{group_permissions, groups, prelude::*, user_groups};

pub struct GroupRepository {
    conn: DatabaseConnection,
}

impl GroupRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Lookup-or-create by name. Concurrent callers race on the unique
    /// `groups.name` index; the loser's insert is a no-op and both read back
    /// the same row.
    pub async fn get_or_create(&self, name: &str) -> Result<groups::Model> {
        let active = groups::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        };

        Groups::insert(active)
            .on_conflict(
                OnConflict::column(groups::Column::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to upsert group")?;

        self.get_by_name(name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Group '{name}' missing after upsert"))
    }

    /// Adds `user_id` to the group. Returns `true` only when a membership row
    /// was inserted.
    pub async fn add_member(&self, group_id: i32, user_id: i32) -> Result<bool> {
        let active = user_groups::ActiveModel {
            user_id: Set(user_id),
            group_id: Set(group_id),
        };

        let inserted = UserGroups::insert(active)
            .on_conflict(
                OnConflict::columns([user_groups::Column::UserId, user_groups::Column::GroupId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to add group member")?;

        Ok(inserted > 0)
    }

    pub async fn member_count(&self, group_id: i32, user_id: i32) -> Result<u64> {
        UserGroups::find()
            .filter(user_groups::Column::GroupId.eq(group_id))
            .filter(user_groups::Column::UserId.eq(user_id))
            .count(&self.conn)
            .await
            .context("Failed to count memberships")
    }

    pub async fn get(&self, id: i32) -> Result<Option<groups::Model>> {
        Groups::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query group")
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<groups::Model>> {
        Groups::find()
            .filter(groups::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query group by name")
    }

    pub async fn get_many(&self, ids: &[i32]) -> Result<Vec<groups::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Groups::find()
            .filter(groups::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(groups::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to query groups")
    }

    pub async fn list(&self, name: Option<&str>) -> Result<Vec<groups::Model>> {
        let mut query = Groups::find().order_by_asc(groups::Column::Id);
        if let Some(name) = name {
            query = query.filter(groups::Column::Name.eq(name));
        }
        query.all(&self.conn).await.context("Failed to list groups")
    }

    pub async fn create(&self, name: &str) -> Result<groups::Model> {
        let active = groups::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        };
        active
            .insert(&self.conn)
            .await
            .context("Failed to insert group")
    }

    pub async fn rename(&self, id: i32, name: &str) -> Result<Option<groups::Model>> {
        let Some(group) = self.get(id).await? else {
            return Ok(None);
        };
        let mut active: groups::ActiveModel = group.into();
        active.name = Set(name.to_string());
        Ok(Some(
            active
                .update(&self.conn)
                .await
                .context("Failed to rename group")?,
        ))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Groups::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete group")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn permission_ids(&self, group_id: i32) -> Result<Vec<i32>> {
        let rows = GroupPermissions::find()
            .filter(group_permissions::Column::GroupId.eq(group_id))
            .order_by_asc(group_permissions::Column::PermissionId)
            .all(&self.conn)
            .await
            .context("Failed to query group permissions")?;
        Ok(rows.into_iter().map(|r| r.permission_id).collect())
    }

    /// Grants one permission. Returns `true` only when it was not already held.
    pub async fn grant(&self, group_id: i32, permission_id: i32) -> Result<bool> {
        let active = group_permissions::ActiveModel {
            group_id: Set(group_id),
            permission_id: Set(permission_id),
        };

        let inserted = GroupPermissions::insert(active)
            .on_conflict(
                OnConflict::columns([
                    group_permissions::Column::GroupId,
                    group_permissions::Column::PermissionId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to grant permission")?;

        Ok(inserted > 0)
    }

    /// Replaces the group's permission set.
    pub async fn set_permissions(&self, group_id: i32, permission_ids: &[i32]) -> Result<()> {
        GroupPermissions::delete_many()
            .filter(group_permissions::Column::GroupId.eq(group_id))
            .exec(&self.conn)
            .await?;

        for &permission_id in permission_ids {
            self.grant(group_id, permission_id).await?;
        }

        Ok(())
    }
}
