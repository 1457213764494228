use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::auth::{CurrentUser, require_permission};
use super::extract::JsonBody;
use super::types::UserResponse;
use super::validation::validate_id;
use super::{ApiError, AppState};
use crate::db::{User, UserFilter};
use crate::domain::{Action, Permission, Resource};
use crate::services::{AccountUpdate, NewAccount};

const fn user_permission(action: Action) -> Permission {
    Permission::new(Resource::User, action)
}

async fn to_response(state: &AppState, user: User) -> Result<UserResponse, ApiError> {
    let repo = state.store.user_repo();
    let groups = repo.group_ids(user.id).await?;
    let permissions = repo.permission_ids(user.id).await?;
    Ok(UserResponse::new(user, groups, permissions))
}

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_permission(&state, &caller, user_permission(Action::View)).await?;

    let users = state.store.user_repo().list(&filter).await?;

    let mut responses = Vec::with_capacity(users.len());
    for user in users {
        responses.push(to_response(&state, user).await?);
    }

    Ok(Json(responses))
}

/// POST /users
/// Runs the same creation pipeline as self-registration.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    JsonBody(payload): JsonBody<NewAccount>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    require_permission(&state, &caller, user_permission(Action::Add)).await?;

    let created = state.account_service.create_account(payload).await?;
    tracing::info!(
        user_id = created.user.id,
        created_by = caller.id(),
        "User created by administrator"
    );

    Ok((
        StatusCode::CREATED,
        Json(to_response(&state, created.user).await?),
    ))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<UserResponse>, ApiError> {
    require_permission(&state, &caller, user_permission(Action::View)).await?;
    let id = validate_id(id)?;

    let user = state
        .store
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(to_response(&state, user).await?))
}

/// PATCH /users/{id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<AccountUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    require_permission(&state, &caller, user_permission(Action::Change)).await?;
    let id = validate_id(id)?;

    let user = state.account_service.update_account(id, payload).await?;

    Ok(Json(to_response(&state, user).await?))
}

/// DELETE /users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    require_permission(&state, &caller, user_permission(Action::Delete)).await?;
    let id = validate_id(id)?;

    if !state.store.user_repo().delete(id).await? {
        return Err(ApiError::not_found("User"));
    }

    tracing::info!(user_id = id, deleted_by = caller.id(), "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
