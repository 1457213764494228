use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::{CurrentUser, require_permission};
use super::extract::JsonBody;
use super::types::GroupResponse;
use super::validation::validate_id;
use super::{ApiError, AppState};
use crate::db::unique_violation;
use crate::domain::{Action, FieldErrors, Permission, Resource};
use crate::entities::groups;

const GROUP_NAME_MAX: usize = 150;
const DUPLICATE_GROUP: &str = "group with this name already exists.";

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupPayload {
    pub name: Option<String>,
    pub permissions: Option<Vec<i32>>,
}

const fn group_permission(action: Action) -> Permission {
    Permission::new(Resource::Group, action)
}

async fn to_response(state: &AppState, group: groups::Model) -> Result<GroupResponse, ApiError> {
    let permissions = state.store.group_repo().permission_ids(group.id).await?;
    Ok(GroupResponse::new(group, permissions))
}

/// Field checks shared by create and update. `name` is required only when
/// creating.
async fn validate(
    state: &AppState,
    payload: &GroupPayload,
    creating: bool,
    exclude: Option<i32>,
) -> Result<Option<String>, ApiError> {
    let mut errors = FieldErrors::new();

    let name = if creating || payload.name.is_some() {
        errors.require("name", payload.name.as_deref()).map(str::trim)
    } else {
        None
    };

    if let Some(name) = name {
        errors.max_length("name", name, GROUP_NAME_MAX);
        if let Some(existing) = state.store.group_repo().get_by_name(name).await?
            && Some(existing.id) != exclude
        {
            errors.add("name", DUPLICATE_GROUP);
        }
    }

    if let Some(ids) = &payload.permissions {
        for id in state.store.permission_repo().unknown_ids(ids).await? {
            errors.add(
                "permissions",
                format!("Invalid pk \"{id}\" - object does not exist."),
            );
        }
    }

    errors.into_result()?;
    Ok(name.map(str::to_string))
}

fn map_unique(err: anyhow::Error) -> ApiError {
    if unique_violation(&err).is_some() {
        ApiError::field("name", DUPLICATE_GROUP)
    } else {
        ApiError::from(err)
    }
}

/// GET /groups
pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Query(query): Query<GroupQuery>,
) -> Result<Json<Vec<GroupResponse>>, ApiError> {
    require_permission(&state, &caller, group_permission(Action::View)).await?;

    let groups = state.store.group_repo().list(query.name.as_deref()).await?;

    let mut responses = Vec::with_capacity(groups.len());
    for group in groups {
        responses.push(to_response(&state, group).await?);
    }
    Ok(Json(responses))
}

/// POST /groups
pub async fn create_group(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    JsonBody(payload): JsonBody<GroupPayload>,
) -> Result<(StatusCode, Json<GroupResponse>), ApiError> {
    require_permission(&state, &caller, group_permission(Action::Add)).await?;

    let Some(name) = validate(&state, &payload, true, None).await? else {
        return Err(ApiError::field("name", crate::domain::REQUIRED));
    };

    let repo = state.store.group_repo();
    let group = repo.create(&name).await.map_err(map_unique)?;
    if let Some(ids) = &payload.permissions {
        repo.set_permissions(group.id, ids).await?;
    }

    Ok((StatusCode::CREATED, Json(to_response(&state, group).await?)))
}

/// GET /groups/{id}
pub async fn get_group(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<GroupResponse>, ApiError> {
    require_permission(&state, &caller, group_permission(Action::View)).await?;
    let id = validate_id(id)?;

    let group = state
        .store
        .group_repo()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Group"))?;

    Ok(Json(to_response(&state, group).await?))
}

/// PATCH /groups/{id}
pub async fn update_group(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<GroupPayload>,
) -> Result<Json<GroupResponse>, ApiError> {
    require_permission(&state, &caller, group_permission(Action::Change)).await?;
    let id = validate_id(id)?;

    let repo = state.store.group_repo();
    let mut group = repo
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Group"))?;

    if let Some(name) = validate(&state, &payload, false, Some(id)).await? {
        group = repo
            .rename(id, &name)
            .await
            .map_err(map_unique)?
            .ok_or_else(|| ApiError::not_found("Group"))?;
    }
    if let Some(ids) = &payload.permissions {
        repo.set_permissions(id, ids).await?;
    }

    Ok(Json(to_response(&state, group).await?))
}

/// DELETE /groups/{id}
pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    require_permission(&state, &caller, group_permission(Action::Delete)).await?;
    let id = validate_id(id)?;

    if !state.store.group_repo().delete(id).await? {
        return Err(ApiError::not_found("Group"));
    }
    Ok(StatusCode::NO_CONTENT)
}
