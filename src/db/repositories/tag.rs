use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};

use crate::entities::{post_tags, prelude::*, tags};

pub struct TagRepository {
    conn: DatabaseConnection,
}

impl TagRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> Result<Vec<tags::Model>> {
        Tags::find()
            .filter(tags::Column::IsDeleted.eq(false))
            .order_by_asc(tags::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list tags")
    }

    /// Resolves a numeric id or a tag name.
    pub async fn find(&self, lookup: &str) -> Result<Option<tags::Model>> {
        let query = Tags::find().filter(tags::Column::IsDeleted.eq(false));
        let query = match lookup.parse::<i32>() {
            Ok(id) => query.filter(tags::Column::Id.eq(id)),
            Err(_) => query.filter(tags::Column::Name.eq(lookup)),
        };
        query.one(&self.conn).await.context("Failed to query tag")
    }

    pub async fn get_many(&self, ids: &[i32]) -> Result<Vec<tags::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Tags::find()
            .filter(tags::Column::Id.is_in(ids.to_vec()))
            .filter(tags::Column::IsDeleted.eq(false))
            .order_by_asc(tags::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to query tags")
    }

    pub async fn create(&self, name: &str) -> Result<tags::Model> {
        let now = crate::db::now();
        let active = tags::ActiveModel {
            name: Set(name.to_string()),
            is_deleted: Set(false),
            created_at: Set(now.clone()),
            modified_at: Set(now),
            ..Default::default()
        };
        active.insert(&self.conn).await.context("Failed to insert tag")
    }

    /// Returns the tag called `name`, inserting it if needed.
    pub async fn get_or_create(&self, name: &str) -> Result<tags::Model> {
        let now = crate::db::now();
        let active = tags::ActiveModel {
            name: Set(name.to_string()),
            is_deleted: Set(false),
            created_at: Set(now.clone()),
            modified_at: Set(now),
            ..Default::default()
        };

        Tags::insert(active)
            .on_conflict(OnConflict::column(tags::Column::Name).do_nothing().to_owned())
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to upsert tag")?;

        Tags::find()
            .filter(tags::Column::Name.eq(name))
            .one(&self.conn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Tag '{name}' missing after upsert"))
    }

    pub async fn post_ids(&self, tag_id: i32) -> Result<Vec<i32>> {
        let rows = PostTags::find()
            .filter(post_tags::Column::TagId.eq(tag_id))
            .order_by_asc(post_tags::Column::PostId)
            .all(&self.conn)
            .await
            .context("Failed to query tagged posts")?;
        Ok(rows.into_iter().map(|r| r.post_id).collect())
    }
}
