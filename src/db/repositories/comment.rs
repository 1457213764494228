use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::Expr,
};

use crate::entities::{comments, prelude::*};

#[derive(Debug, Clone)]
pub struct NewComment {
    pub user_id: i32,
    pub post_id: i32,
    pub message: String,
    pub reply_to_id: Option<i32>,
}

pub struct CommentRepository {
    conn: DatabaseConnection,
}

impl CommentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_for_post(
        &self,
        post_id: i32,
        approved_only: bool,
    ) -> Result<Vec<comments::Model>> {
        let mut query = Comments::find()
            .filter(comments::Column::PostId.eq(post_id))
            .filter(comments::Column::IsDeleted.eq(false))
            .order_by_asc(comments::Column::Id);
        if approved_only {
            query = query.filter(comments::Column::IsApproved.eq(true));
        }
        query
            .all(&self.conn)
            .await
            .context("Failed to list comments")
    }

    pub async fn get(&self, id: i32) -> Result<Option<comments::Model>> {
        Comments::find_by_id(id)
            .filter(comments::Column::IsDeleted.eq(false))
            .one(&self.conn)
            .await
            .context("Failed to query comment")
    }

    pub async fn create(&self, new: NewComment) -> Result<comments::Model> {
        let now = crate::db::now();
        let active = comments::ActiveModel {
            user_id: Set(new.user_id),
            message: Set(new.message),
            reply_to_id: Set(new.reply_to_id),
            post_id: Set(new.post_id),
            is_approved: Set(false),
            is_deleted: Set(false),
            created_at: Set(now.clone()),
            modified_at: Set(now),
            ..Default::default()
        };
        active
            .insert(&self.conn)
            .await
            .context("Failed to insert comment")
    }

    pub async fn set_approved(&self, id: i32, is_approved: bool) -> Result<Option<comments::Model>> {
        let Some(row) = self.get(id).await? else {
            return Ok(None);
        };
        let mut active: comments::ActiveModel = row.into();
        active.is_approved = Set(is_approved);
        active.modified_at = Set(crate::db::now());
        Ok(Some(
            active
                .update(&self.conn)
                .await
                .context("Failed to approve comment")?,
        ))
    }

    pub async fn soft_delete(&self, id: i32) -> Result<bool> {
        let result = Comments::update_many()
            .col_expr(comments::Column::IsDeleted, Expr::value(true))
            .col_expr(comments::Column::ModifiedAt, Expr::value(crate::db::now()))
            .filter(comments::Column::Id.eq(id))
            .filter(comments::Column::IsDeleted.eq(false))
            .exec(&self.conn)
            .await
            .context("Failed to delete comment")?;
        Ok(result.rows_affected > 0)
    }
}
