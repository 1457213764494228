use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, sea_query::Expr,
};

use crate::entities::{categories, posts, prelude::*};

#[derive(Debug, Clone, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    /// `Some(None)` clears the parent.
    pub parent_id: Option<Option<i32>>,
}

pub struct CategoryRepository {
    conn: DatabaseConnection,
}

impl CategoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> Result<Vec<categories::Model>> {
        Categories::find()
            .filter(categories::Column::IsDeleted.eq(false))
            .order_by_asc(categories::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list categories")
    }

    /// Resolves a numeric id or a category name.
    pub async fn find(&self, lookup: &str) -> Result<Option<categories::Model>> {
        let query = Categories::find().filter(categories::Column::IsDeleted.eq(false));
        let query = match lookup.parse::<i32>() {
            Ok(id) => query.filter(categories::Column::Id.eq(id)),
            Err(_) => query
                .filter(categories::Column::Name.eq(lookup))
                .order_by_asc(categories::Column::Id),
        };
        query
            .one(&self.conn)
            .await
            .context("Failed to query category")
    }

    pub async fn get(&self, id: i32) -> Result<Option<categories::Model>> {
        Categories::find_by_id(id)
            .filter(categories::Column::IsDeleted.eq(false))
            .one(&self.conn)
            .await
            .context("Failed to query category")
    }

    pub async fn create(&self, name: &str, parent_id: Option<i32>) -> Result<categories::Model> {
        let now = crate::db::now();
        let active = categories::ActiveModel {
            name: Set(name.to_string()),
            parent_id: Set(parent_id),
            is_deleted: Set(false),
            created_at: Set(now.clone()),
            modified_at: Set(now),
            ..Default::default()
        };
        active
            .insert(&self.conn)
            .await
            .context("Failed to insert category")
    }

    /// Top-level category called `name`, created when absent.
    pub async fn get_or_create_root(&self, name: &str) -> Result<categories::Model> {
        let existing = Categories::find()
            .filter(categories::Column::Name.eq(name))
            .filter(categories::Column::ParentId.is_null())
            .filter(categories::Column::IsDeleted.eq(false))
            .one(&self.conn)
            .await?;

        match existing {
            Some(category) => Ok(category),
            None => self.create(name, None).await,
        }
    }

    pub async fn update(
        &self,
        id: i32,
        changes: CategoryChanges,
    ) -> Result<Option<categories::Model>> {
        let Some(row) = self.get(id).await? else {
            return Ok(None);
        };

        let mut active: categories::ActiveModel = row.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(parent_id) = changes.parent_id {
            active.parent_id = Set(parent_id);
        }
        active.modified_at = Set(crate::db::now());

        Ok(Some(
            active
                .update(&self.conn)
                .await
                .context("Failed to update category")?,
        ))
    }

    /// Soft-deletes the category after moving its posts to `fallback`.
    /// Returns `false` when the category does not exist.
    pub async fn soft_delete(&self, id: i32, fallback: &str) -> Result<bool> {
        let Some(category) = self.get(id).await? else {
            return Ok(false);
        };

        let target = self.get_or_create_root(fallback).await?;
        if target.id == category.id {
            anyhow::bail!("Cannot delete the '{fallback}' category itself");
        }

        let now = crate::db::now();
        let txn = self.conn.begin().await?;

        Posts::update_many()
            .col_expr(posts::Column::CategoryId, Expr::value(target.id))
            .col_expr(posts::Column::ModifiedAt, Expr::value(now.clone()))
            .filter(posts::Column::CategoryId.eq(category.id))
            .exec(&txn)
            .await
            .context("Failed to move posts out of category")?;

        let mut active: categories::ActiveModel = category.into();
        active.is_deleted = Set(true);
        active.modified_at = Set(now);
        active.update(&txn).await?;

        txn.commit().await?;

        Ok(true)
    }
}
