use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{CommentResponse, find_post};
use crate::api::auth::{CurrentUser, require_permission};
use crate::api::extract::JsonBody;
use crate::api::validation::{COMMENT_MESSAGE_MAX, required_text, validate_id};
use crate::api::{ApiError, AppState};
use crate::db::NewComment;
use crate::domain::{Action, FieldErrors, Permission, Resource};
use crate::entities::comments;

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub is_approved: Option<bool>,
}

const fn comment_permission(action: Action) -> Permission {
    Permission::new(Resource::Comment, action)
}

async fn find_comment(state: &AppState, id: i32) -> Result<comments::Model, ApiError> {
    let id = validate_id(id)?;
    state
        .store
        .comment_repo()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))
}

async fn add_comment(
    state: &AppState,
    caller: &CurrentUser,
    post_id: i32,
    reply_to_id: Option<i32>,
    payload: CommentRequest,
) -> Result<comments::Model, ApiError> {
    let mut errors = FieldErrors::new();
    let message = required_text(
        &mut errors,
        "message",
        payload.message.as_deref(),
        COMMENT_MESSAGE_MAX,
    );
    errors.into_result()?;
    let Some(message) = message else {
        return Err(ApiError::field("message", crate::domain::REQUIRED));
    };

    let comment = state
        .store
        .comment_repo()
        .create(NewComment {
            user_id: caller.id(),
            post_id,
            message,
            reply_to_id,
        })
        .await?;

    tracing::info!(
        comment_id = comment.id,
        post_id,
        "Comment added, awaiting approval"
    );
    Ok(comment)
}

/// GET /blog/posts/{post}/comments
/// Approved comments only.
pub async fn list_post_comments(
    State(state): State<Arc<AppState>>,
    Path(lookup): Path<String>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    let post = find_post(&state, &lookup).await?;
    let comments = state
        .store
        .comment_repo()
        .list_for_post(post.id, true)
        .await?;
    Ok(Json(
        comments.into_iter().map(CommentResponse::from).collect(),
    ))
}

/// POST /blog/posts/{post}/comments
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(lookup): Path<String>,
    JsonBody(payload): JsonBody<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    require_permission(&state, &caller, comment_permission(Action::Add)).await?;
    let post = find_post(&state, &lookup).await?;

    let comment = add_comment(&state, &caller, post.id, None, payload).await?;
    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

/// POST /blog/posts/{post}/comments/{comment}/replies
pub async fn reply_to_comment(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path((lookup, comment_id)): Path<(String, i32)>,
    JsonBody(payload): JsonBody<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    require_permission(&state, &caller, comment_permission(Action::Add)).await?;
    let post = find_post(&state, &lookup).await?;
    let parent = find_comment(&state, comment_id).await?;
    if parent.post_id != post.id {
        return Err(ApiError::not_found("Comment"));
    }

    let comment = add_comment(&state, &caller, post.id, Some(parent.id), payload).await?;
    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

/// GET /blog/comments/{id}
pub async fn get_comment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = find_comment(&state, id).await?;
    Ok(Json(CommentResponse::from(comment)))
}

/// DELETE /blog/comments/{id}
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    require_permission(&state, &caller, comment_permission(Action::Delete)).await?;
    let comment = find_comment(&state, id).await?;

    if !state.store.comment_repo().soft_delete(comment.id).await? {
        return Err(ApiError::not_found("Comment"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /blog/comments/{id}/approve
pub async fn approve_comment(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<ApproveRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    require_permission(&state, &caller, comment_permission(Action::Change)).await?;

    let Some(is_approved) = payload.is_approved else {
        return Err(ApiError::field("is_approved", crate::domain::REQUIRED));
    };

    let comment = find_comment(&state, id).await?;
    let comment = state
        .store
        .comment_repo()
        .set_approved(comment.id, is_approved)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    Ok(Json(CommentResponse::from(comment)))
}
