//! Blog content: posts, tags, categories, comments, stars and bookmarks.
//!
//! Reads are public. Writes take a [`CurrentUser`](super::auth::CurrentUser)
//! extractor instead of a route layer, so a path can serve both.

use axum::{
    Router,
    routing::{get, post, put},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::db::repositories::star;
use crate::entities;

mod categories;
mod comments;
mod posts;
mod tags;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route(
            "/posts/{post}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route(
            "/posts/{post}/bookmark",
            post(posts::add_bookmark).delete(posts::remove_bookmark),
        )
        .route("/posts/{post}/tags", post(posts::add_post_tag))
        .route(
            "/posts/{post}/tags/{tag}",
            axum::routing::delete(posts::remove_post_tag),
        )
        .route("/posts/{post}/stars", post(posts::star_post))
        .route(
            "/posts/{post}/comments",
            get(comments::list_post_comments).post(comments::create_comment),
        )
        .route(
            "/posts/{post}/comments/{comment}/replies",
            post(comments::reply_to_comment),
        )
        .route("/tags", get(tags::list_tags).post(tags::create_tag))
        .route("/tags/{tag}", get(tags::get_tag))
        .route("/tags/{tag}/posts", get(tags::tag_posts))
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/{category}",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route(
            "/comments/{id}",
            get(comments::get_comment).delete(comments::delete_comment),
        )
        .route("/comments/{id}/approve", put(comments::approve_comment))
        .route("/me/stars", get(posts::my_stars))
        .route("/me/bookmarks", get(posts::my_bookmarks))
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i32,
    pub title: String,
    pub brief: String,
    pub content: String,
    pub slug: String,
    pub tags: Vec<i32>,
    pub bookmarks: Vec<i32>,
    pub image: String,
    pub is_draft: bool,
    pub previous: Option<i32>,
    pub publisher: i32,
    pub category: i32,
    pub visited: i32,
    pub created_at: String,
    pub modified_at: String,
}

/// A post together with its stars and approved comments.
#[derive(Debug, Serialize)]
pub struct FullPost {
    #[serde(flatten)]
    pub post: PostResponse,
    pub stars: Vec<StarResponse>,
    pub average_stars: f64,
    #[serde(rename = "commentsCount")]
    pub comments_count: usize,
    pub comments: Vec<CommentResponse>,
}

#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub id: i32,
    pub name: String,
    pub created_at: String,
    pub modified_at: String,
}

impl From<entities::tags::Model> for TagResponse {
    fn from(t: entities::tags::Model) -> Self {
        Self {
            id: t.id,
            name: t.name,
            created_at: t.created_at,
            modified_at: t.modified_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
    pub parent: Option<i32>,
    pub created_at: String,
    pub modified_at: String,
}

impl From<entities::categories::Model> for CategoryResponse {
    fn from(c: entities::categories::Model) -> Self {
        Self {
            id: c.id,
            name: c.name,
            parent: c.parent_id,
            created_at: c.created_at,
            modified_at: c.modified_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i32,
    pub user: i32,
    pub post: i32,
    pub message: String,
    pub reply_to: Option<i32>,
    pub is_approved: bool,
    pub created_at: String,
    pub modified_at: String,
}

impl From<entities::comments::Model> for CommentResponse {
    fn from(c: entities::comments::Model) -> Self {
        Self {
            id: c.id,
            user: c.user_id,
            post: c.post_id,
            message: c.message,
            reply_to: c.reply_to_id,
            is_approved: c.is_approved,
            created_at: c.created_at,
            modified_at: c.modified_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StarResponse {
    pub id: i32,
    pub star: i32,
    pub user: i32,
    pub post: i32,
}

impl From<entities::stars::Model> for StarResponse {
    fn from(s: entities::stars::Model) -> Self {
        Self {
            id: s.id,
            star: s.star,
            user: s.user_id,
            post: s.post_id,
        }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

async fn post_response(
    state: &AppState,
    post: entities::posts::Model,
) -> Result<PostResponse, ApiError> {
    let repo = state.store.post_repo();
    let tags = repo.tag_ids(post.id).await?;
    let bookmarks = repo.bookmark_user_ids(post.id).await?;

    Ok(PostResponse {
        id: post.id,
        title: post.title,
        brief: post.brief,
        content: post.content,
        slug: post.slug,
        tags,
        bookmarks,
        image: post.image,
        is_draft: post.is_draft,
        previous: post.previous_id,
        publisher: post.publisher_id,
        category: post.category_id,
        visited: post.visited,
        created_at: post.created_at,
        modified_at: post.modified_at,
    })
}

async fn full_post(
    state: &AppState,
    post: entities::posts::Model,
) -> Result<FullPost, ApiError> {
    let post_id = post.id;
    let post = post_response(state, post).await?;

    let stars = state.store.star_repo().list_for_post(post_id).await?;
    let average_stars = star::average(&stars);

    let comments: Vec<CommentResponse> = state
        .store
        .comment_repo()
        .list_for_post(post_id, true)
        .await?
        .into_iter()
        .map(CommentResponse::from)
        .collect();

    Ok(FullPost {
        post,
        stars: stars.into_iter().map(StarResponse::from).collect(),
        average_stars,
        comments_count: comments.len(),
        comments,
    })
}

/// Full posts keyed by id.
async fn keyed_full_posts(
    state: &AppState,
    posts: Vec<entities::posts::Model>,
) -> Result<BTreeMap<i32, FullPost>, ApiError> {
    let mut result = BTreeMap::new();
    for post in posts {
        result.insert(post.id, full_post(state, post).await?);
    }
    Ok(result)
}

async fn find_post(
    state: &AppState,
    lookup: &str,
) -> Result<entities::posts::Model, ApiError> {
    state
        .store
        .post_repo()
        .find(lookup)
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))
}

async fn find_tag(
    state: &AppState,
    lookup: &str,
) -> Result<entities::tags::Model, ApiError> {
    state
        .store
        .tag_repo()
        .find(lookup)
        .await?
        .ok_or_else(|| ApiError::not_found("Tag"))
}
