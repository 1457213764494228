use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{
    FullPost, PostResponse, StarResponse, find_post, find_tag, full_post, keyed_full_posts,
    post_response,
};
use crate::api::auth::{CurrentUser, require_permission};
use crate::api::extract::JsonBody;
use crate::api::validation::{
    POST_TITLE_MAX, TAG_NAME_MAX, double_option, required_text, slugify, validate_star,
};
use crate::api::{ApiError, AppState};
use crate::db::{NewPost, PostChanges, unique_violation};
use crate::domain::{Action, FieldErrors, Permission, Resource};

const DUPLICATE_TITLE: &str = "post with this title already exists.";
const DUPLICATE_SLUG: &str = "post with this slug already exists.";
const DUPLICATE_TAG: &str = "tag with this name already exists.";

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub brief: String,
    pub content: Option<String>,
    pub slug: Option<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub is_draft: bool,
    pub previous: Option<i32>,
    pub category: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub brief: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub image: Option<String>,
    pub is_draft: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub previous: Option<Option<i32>>,
    pub category: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StarRequest {
    pub star: Option<i32>,
}

const fn post_permission(action: Action) -> Permission {
    Permission::new(Resource::Post, action)
}

fn map_unique(err: anyhow::Error) -> ApiError {
    match unique_violation(&err) {
        Some(msg) if msg.contains("posts.slug") => ApiError::field("slug", DUPLICATE_SLUG),
        Some(msg) if msg.contains("posts.title") => ApiError::field("title", DUPLICATE_TITLE),
        _ => ApiError::from(err),
    }
}

/// Checks that referenced category and previous post exist.
async fn check_references(
    state: &AppState,
    errors: &mut FieldErrors,
    category: Option<i32>,
    previous: Option<i32>,
) -> Result<(), ApiError> {
    if let Some(id) = category
        && state.store.category_repo().get(id).await?.is_none()
    {
        errors.add(
            "category",
            format!("Invalid pk \"{id}\" - object does not exist."),
        );
    }
    if let Some(id) = previous
        && state.store.post_repo().find(&id.to_string()).await?.is_none()
    {
        errors.add(
            "previous",
            format!("Invalid pk \"{id}\" - object does not exist."),
        );
    }
    Ok(())
}

// ============================================================================
// Posts
// ============================================================================

/// GET /blog/posts
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<i32, FullPost>>, ApiError> {
    let posts = state.store.post_repo().list().await?;
    Ok(Json(keyed_full_posts(&state, posts).await?))
}

/// POST /blog/posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    JsonBody(payload): JsonBody<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    require_permission(&state, &caller, post_permission(Action::Add)).await?;

    let mut errors = FieldErrors::new();
    let title = required_text(&mut errors, "title", payload.title.as_deref(), POST_TITLE_MAX);
    let content = errors.require("content", payload.content.as_deref());
    if payload.category.is_none() {
        errors.add("category", crate::domain::REQUIRED);
    }
    check_references(&state, &mut errors, payload.category, payload.previous).await?;

    let slug = match payload.slug.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => slug.to_string(),
        _ => title.as_deref().map(slugify).unwrap_or_default(),
    };
    if title.is_some() && slug.is_empty() {
        errors.add("slug", crate::domain::BLANK);
    }

    errors.into_result()?;

    let (Some(title), Some(content), Some(category_id)) = (title, content, payload.category)
    else {
        return Err(ApiError::internal("post validation left a required field unset"));
    };

    let post = state
        .store
        .post_repo()
        .create(NewPost {
            title,
            brief: payload.brief,
            content: content.to_string(),
            slug,
            image: payload.image,
            is_draft: payload.is_draft,
            previous_id: payload.previous,
            publisher_id: caller.id(),
            category_id,
        })
        .await
        .map_err(map_unique)?;

    tracing::info!(post_id = post.id, publisher = caller.id(), "Post created");

    Ok((StatusCode::CREATED, Json(post_response(&state, post).await?)))
}

/// GET /blog/posts/{post}
/// Counts as a visit.
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(lookup): Path<String>,
) -> Result<Json<BTreeMap<i32, FullPost>>, ApiError> {
    let post = find_post(&state, &lookup).await?;
    state.store.post_repo().increment_visited(post.id).await?;

    let post = find_post(&state, &post.id.to_string()).await?;
    let id = post.id;
    let mut result = BTreeMap::new();
    result.insert(id, full_post(&state, post).await?);
    Ok(Json(result))
}

/// PUT /blog/posts/{post}
/// Partial update; absent fields are left untouched.
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(lookup): Path<String>,
    JsonBody(payload): JsonBody<UpdatePostRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    require_permission(&state, &caller, post_permission(Action::Change)).await?;
    let post = find_post(&state, &lookup).await?;

    let mut errors = FieldErrors::new();
    let title = match payload.title.as_deref() {
        Some(_) => required_text(&mut errors, "title", payload.title.as_deref(), POST_TITLE_MAX),
        None => None,
    };
    if payload.content.is_some() {
        errors.require("content", payload.content.as_deref());
    }
    let slug = match payload.slug.as_deref() {
        Some(slug) => errors.require("slug", Some(slug)).map(|s| s.trim().to_string()),
        None => None,
    };
    if payload.previous.flatten() == Some(post.id) {
        errors.add("previous", "A post cannot follow itself.");
    }
    check_references(
        &state,
        &mut errors,
        payload.category,
        payload.previous.flatten(),
    )
    .await?;
    errors.into_result()?;

    let changes = PostChanges {
        title,
        brief: payload.brief,
        content: payload.content,
        slug,
        image: payload.image,
        is_draft: payload.is_draft,
        previous_id: payload.previous,
        category_id: payload.category,
    };

    let post = state
        .store
        .post_repo()
        .update(post.id, changes)
        .await
        .map_err(map_unique)?
        .ok_or_else(|| ApiError::not_found("Post"))?;

    Ok(Json(post_response(&state, post).await?))
}

/// DELETE /blog/posts/{post}
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(lookup): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_permission(&state, &caller, post_permission(Action::Delete)).await?;
    let post = find_post(&state, &lookup).await?;

    if !state.store.post_repo().soft_delete(post.id).await? {
        return Err(ApiError::not_found("Post"));
    }

    tracing::info!(post_id = post.id, deleted_by = caller.id(), "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Bookmarks and tags
// ============================================================================

/// POST /blog/posts/{post}/bookmark
pub async fn add_bookmark(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(lookup): Path<String>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = find_post(&state, &lookup).await?;
    state.store.post_repo().bookmark(post.id, caller.id()).await?;
    Ok(Json(post_response(&state, post).await?))
}

/// DELETE /blog/posts/{post}/bookmark
pub async fn remove_bookmark(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(lookup): Path<String>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = find_post(&state, &lookup).await?;
    state
        .store
        .post_repo()
        .unbookmark(post.id, caller.id())
        .await?;
    Ok(Json(post_response(&state, post).await?))
}

/// POST /blog/posts/{post}/tags
/// Creates a new tag and attaches it to the post.
pub async fn add_post_tag(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(lookup): Path<String>,
    JsonBody(payload): JsonBody<TagRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    require_permission(&state, &caller, Permission::new(Resource::Tag, Action::Add)).await?;
    let post = find_post(&state, &lookup).await?;

    let mut errors = FieldErrors::new();
    let name = required_text(&mut errors, "name", payload.name.as_deref(), TAG_NAME_MAX);
    errors.into_result()?;
    let Some(name) = name else {
        return Err(ApiError::field("name", crate::domain::REQUIRED));
    };

    let tag = state.store.tag_repo().create(&name).await.map_err(|e| {
        if unique_violation(&e).is_some() {
            ApiError::field("name", DUPLICATE_TAG)
        } else {
            ApiError::from(e)
        }
    })?;
    state.store.post_repo().attach_tag(post.id, tag.id).await?;

    Ok(Json(post_response(&state, post).await?))
}

/// DELETE /blog/posts/{post}/tags/{tag}
pub async fn remove_post_tag(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path((lookup, tag_lookup)): Path<(String, String)>,
) -> Result<Json<PostResponse>, ApiError> {
    require_permission(&state, &caller, post_permission(Action::Change)).await?;
    let post = find_post(&state, &lookup).await?;
    let tag = find_tag(&state, &tag_lookup).await?;

    if !state.store.post_repo().detach_tag(post.id, tag.id).await? {
        return Err(ApiError::NotFound(
            "Post does not have a tag with your value".to_string(),
        ));
    }

    Ok(Json(post_response(&state, post).await?))
}

// ============================================================================
// Stars
// ============================================================================

/// POST /blog/posts/{post}/stars
/// One star per user and post; starring again replaces the value.
pub async fn star_post(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(lookup): Path<String>,
    JsonBody(payload): JsonBody<StarRequest>,
) -> Result<(StatusCode, Json<StarResponse>), ApiError> {
    require_permission(&state, &caller, Permission::new(Resource::Star, Action::Add)).await?;
    let post = find_post(&state, &lookup).await?;

    let blog = &state.config.blog;
    let mut errors = FieldErrors::new();
    let star = validate_star(&mut errors, payload.star, blog.star_min, blog.star_max);
    errors.into_result()?;
    let Some(star) = star else {
        return Err(ApiError::field("star", crate::domain::REQUIRED));
    };

    let saved = state
        .store
        .star_repo()
        .upsert(caller.id(), post.id, star)
        .await?;

    Ok((StatusCode::CREATED, Json(StarResponse::from(saved))))
}

/// GET /blog/me/stars
pub async fn my_stars(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
) -> Result<Json<Vec<StarResponse>>, ApiError> {
    let stars = state.store.star_repo().list_for_user(caller.id()).await?;
    Ok(Json(stars.into_iter().map(StarResponse::from).collect()))
}

/// GET /blog/me/bookmarks
pub async fn my_bookmarks(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let posts = state.store.post_repo().bookmarked_by(caller.id()).await?;

    let mut responses = Vec::with_capacity(posts.len());
    for post in posts {
        responses.push(post_response(&state, post).await?);
    }
    Ok(Json(responses))
}
