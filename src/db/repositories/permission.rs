use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};

use crate::domain::Permission;
use crate::entities::{permissions, prelude::*};

pub struct PermissionRepository {
    conn: DatabaseConnection,
}

impl PermissionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Inserts every known capability that is not stored yet and returns the
    /// number of rows added.
    pub async fn sync(&self) -> Result<u64> {
        let rows = Permission::all().map(|p| permissions::ActiveModel {
            app_label: Set(p.resource.app_label().to_string()),
            model: Set(p.resource.model().to_string()),
            codename: Set(p.codename()),
            name: Set(p.name()),
            ..Default::default()
        });

        Permissions::insert_many(rows)
            .on_conflict(
                OnConflict::column(permissions::Column::Codename)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to sync permissions")
    }

    pub async fn list(
        &self,
        name: Option<&str>,
        codename: Option<&str>,
    ) -> Result<Vec<permissions::Model>> {
        let mut query = Permissions::find().order_by_asc(permissions::Column::Id);
        if let Some(name) = name {
            query = query.filter(permissions::Column::Name.eq(name));
        }
        if let Some(codename) = codename {
            query = query.filter(permissions::Column::Codename.eq(codename));
        }
        query
            .all(&self.conn)
            .await
            .context("Failed to list permissions")
    }

    pub async fn get(&self, id: i32) -> Result<Option<permissions::Model>> {
        Permissions::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query permission")
    }

    pub async fn get_many(&self, ids: &[i32]) -> Result<Vec<permissions::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Permissions::find()
            .filter(permissions::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(permissions::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to query permissions")
    }

    pub async fn find(&self, permission: Permission) -> Result<Option<permissions::Model>> {
        Permissions::find()
            .filter(permissions::Column::Codename.eq(permission.codename()))
            .one(&self.conn)
            .await
            .context("Failed to query permission by codename")
    }

    /// Ids from `ids` that do not name a stored permission.
    pub async fn unknown_ids(&self, ids: &[i32]) -> Result<Vec<i32>> {
        let found: Vec<i32> = self.get_many(ids).await?.into_iter().map(|p| p.id).collect();
        Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
    }
}
