use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::{Expr, OnConflict},
};

use crate::entities::{post_bookmarks, post_tags, posts, prelude::*};

#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub brief: String,
    pub content: String,
    pub slug: String,
    pub image: String,
    pub is_draft: bool,
    pub previous_id: Option<i32>,
    pub publisher_id: i32,
    pub category_id: i32,
}

#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub brief: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub image: Option<String>,
    pub is_draft: Option<bool>,
    pub previous_id: Option<Option<i32>>,
    pub category_id: Option<i32>,
}

pub struct PostRepository {
    conn: DatabaseConnection,
}

impl PostRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> Result<Vec<posts::Model>> {
        Posts::find()
            .filter(posts::Column::IsDeleted.eq(false))
            .order_by_asc(posts::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list posts")
    }

    pub async fn get_many(&self, ids: &[i32]) -> Result<Vec<posts::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Posts::find()
            .filter(posts::Column::Id.is_in(ids.to_vec()))
            .filter(posts::Column::IsDeleted.eq(false))
            .order_by_asc(posts::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to query posts")
    }

    /// Resolves a numeric id or a post title.
    pub async fn find(&self, lookup: &str) -> Result<Option<posts::Model>> {
        let query = Posts::find().filter(posts::Column::IsDeleted.eq(false));
        let query = match lookup.parse::<i32>() {
            Ok(id) => query.filter(posts::Column::Id.eq(id)),
            Err(_) => query.filter(posts::Column::Title.eq(lookup)),
        };
        query.one(&self.conn).await.context("Failed to query post")
    }

    pub async fn create(&self, new: NewPost) -> Result<posts::Model> {
        let now = crate::db::now();
        let active = posts::ActiveModel {
            title: Set(new.title),
            brief: Set(new.brief),
            content: Set(new.content),
            slug: Set(new.slug),
            image: Set(new.image),
            is_draft: Set(new.is_draft),
            previous_id: Set(new.previous_id),
            publisher_id: Set(new.publisher_id),
            category_id: Set(new.category_id),
            visited: Set(0),
            is_deleted: Set(false),
            created_at: Set(now.clone()),
            modified_at: Set(now),
            ..Default::default()
        };
        active.insert(&self.conn).await.context("Failed to insert post")
    }

    pub async fn update(&self, id: i32, changes: PostChanges) -> Result<Option<posts::Model>> {
        let Some(row) = Posts::find_by_id(id)
            .filter(posts::Column::IsDeleted.eq(false))
            .one(&self.conn)
            .await?
        else {
            return Ok(None);
        };

        let mut active: posts::ActiveModel = row.into();
        if let Some(v) = changes.title {
            active.title = Set(v);
        }
        if let Some(v) = changes.brief {
            active.brief = Set(v);
        }
        if let Some(v) = changes.content {
            active.content = Set(v);
        }
        if let Some(v) = changes.slug {
            active.slug = Set(v);
        }
        if let Some(v) = changes.image {
            active.image = Set(v);
        }
        if let Some(v) = changes.is_draft {
            active.is_draft = Set(v);
        }
        if let Some(v) = changes.previous_id {
            active.previous_id = Set(v);
        }
        if let Some(v) = changes.category_id {
            active.category_id = Set(v);
        }
        active.modified_at = Set(crate::db::now());

        Ok(Some(
            active
                .update(&self.conn)
                .await
                .context("Failed to update post")?,
        ))
    }

    pub async fn soft_delete(&self, id: i32) -> Result<bool> {
        let result = Posts::update_many()
            .col_expr(posts::Column::IsDeleted, Expr::value(true))
            .col_expr(posts::Column::ModifiedAt, Expr::value(crate::db::now()))
            .filter(posts::Column::Id.eq(id))
            .filter(posts::Column::IsDeleted.eq(false))
            .exec(&self.conn)
            .await
            .context("Failed to delete post")?;
        Ok(result.rows_affected > 0)
    }

    /// Bumps the view counter in a single statement.
    pub async fn increment_visited(&self, id: i32) -> Result<()> {
        Posts::update_many()
            .col_expr(
                posts::Column::Visited,
                Expr::col(posts::Column::Visited).add(1),
            )
            .filter(posts::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to increment visited")?;
        Ok(())
    }

    pub async fn tag_ids(&self, post_id: i32) -> Result<Vec<i32>> {
        let rows = PostTags::find()
            .filter(post_tags::Column::PostId.eq(post_id))
            .order_by_asc(post_tags::Column::TagId)
            .all(&self.conn)
            .await
            .context("Failed to query post tags")?;
        Ok(rows.into_iter().map(|r| r.tag_id).collect())
    }

    pub async fn attach_tag(&self, post_id: i32, tag_id: i32) -> Result<bool> {
        let active = post_tags::ActiveModel {
            post_id: Set(post_id),
            tag_id: Set(tag_id),
        };
        let inserted = PostTags::insert(active)
            .on_conflict(
                OnConflict::columns([post_tags::Column::PostId, post_tags::Column::TagId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to attach tag")?;
        Ok(inserted > 0)
    }

    pub async fn detach_tag(&self, post_id: i32, tag_id: i32) -> Result<bool> {
        let result = PostTags::delete_many()
            .filter(post_tags::Column::PostId.eq(post_id))
            .filter(post_tags::Column::TagId.eq(tag_id))
            .exec(&self.conn)
            .await
            .context("Failed to detach tag")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn bookmark(&self, post_id: i32, user_id: i32) -> Result<bool> {
        let active = post_bookmarks::ActiveModel {
            post_id: Set(post_id),
            user_id: Set(user_id),
        };
        let inserted = PostBookmarks::insert(active)
            .on_conflict(
                OnConflict::columns([
                    post_bookmarks::Column::PostId,
                    post_bookmarks::Column::UserId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to bookmark post")?;
        Ok(inserted > 0)
    }

    pub async fn unbookmark(&self, post_id: i32, user_id: i32) -> Result<bool> {
        let result = PostBookmarks::delete_many()
            .filter(post_bookmarks::Column::PostId.eq(post_id))
            .filter(post_bookmarks::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to remove bookmark")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn bookmarked_by(&self, user_id: i32) -> Result<Vec<posts::Model>> {
        let ids: Vec<i32> = PostBookmarks::find()
            .filter(post_bookmarks::Column::UserId.eq(user_id))
            .all(&self.conn)
            .await
            .context("Failed to query bookmarks")?
            .into_iter()
            .map(|r| r.post_id)
            .collect();
        self.get_many(&ids).await
    }

    pub async fn bookmark_user_ids(&self, post_id: i32) -> Result<Vec<i32>> {
        let rows = PostBookmarks::find()
            .filter(post_bookmarks::Column::PostId.eq(post_id))
            .order_by_asc(post_bookmarks::Column::UserId)
            .all(&self.conn)
            .await
            .context("Failed to query post bookmarks")?;
        Ok(rows.into_iter().map(|r| r.user_id).collect())
    }
}
