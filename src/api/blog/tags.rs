use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::posts::TagRequest;
use super::{FullPost, TagResponse, find_tag, keyed_full_posts};
use crate::api::auth::{CurrentUser, require_permission};
use crate::api::extract::JsonBody;
use crate::api::validation::{TAG_NAME_MAX, required_text};
use crate::api::{ApiError, AppState};
use crate::db::unique_violation;
use crate::domain::{Action, FieldErrors, Permission, Resource};

/// GET /blog/tags
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TagResponse>>, ApiError> {
    let tags = state.store.tag_repo().list().await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

/// POST /blog/tags
pub async fn create_tag(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    JsonBody(payload): JsonBody<TagRequest>,
) -> Result<(StatusCode, Json<TagResponse>), ApiError> {
    require_permission(&state, &caller, Permission::new(Resource::Tag, Action::Add)).await?;

    let mut errors = FieldErrors::new();
    let name = required_text(&mut errors, "name", payload.name.as_deref(), TAG_NAME_MAX);
    errors.into_result()?;
    let Some(name) = name else {
        return Err(ApiError::field("name", crate::domain::REQUIRED));
    };

    let tag = state.store.tag_repo().create(&name).await.map_err(|e| {
        if unique_violation(&e).is_some() {
            ApiError::field("name", "tag with this name already exists.")
        } else {
            ApiError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(TagResponse::from(tag))))
}

/// GET /blog/tags/{tag}
pub async fn get_tag(
    State(state): State<Arc<AppState>>,
    Path(lookup): Path<String>,
) -> Result<Json<TagResponse>, ApiError> {
    let tag = find_tag(&state, &lookup).await?;
    Ok(Json(TagResponse::from(tag)))
}

/// GET /blog/tags/{tag}/posts
pub async fn tag_posts(
    State(state): State<Arc<AppState>>,
    Path(lookup): Path<String>,
) -> Result<Json<BTreeMap<i32, FullPost>>, ApiError> {
    let tag = find_tag(&state, &lookup).await?;

    let post_ids = state.store.tag_repo().post_ids(tag.id).await?;
    let posts = state.store.post_repo().get_many(&post_ids).await?;

    Ok(Json(keyed_full_posts(&state, posts).await?))
}
