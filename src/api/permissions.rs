use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::{CurrentUser, require_permission};
use super::types::{ContentTypeResponse, PermissionResponse};
use super::validation::validate_id;
use super::{ApiError, AppState};
use crate::domain::{Action, Permission, Resource};

#[derive(Debug, Deserialize)]
pub struct PermissionQuery {
    pub name: Option<String>,
    pub codename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContentTypeQuery {
    pub name: Option<String>,
    pub app_label: Option<String>,
}

/// GET /permissions
pub async fn list_permissions(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Query(query): Query<PermissionQuery>,
) -> Result<Json<Vec<PermissionResponse>>, ApiError> {
    require_permission(
        &state,
        &caller,
        Permission::new(Resource::Permission, Action::View),
    )
    .await?;

    let permissions = state
        .store
        .permission_repo()
        .list(query.name.as_deref(), query.codename.as_deref())
        .await?;

    Ok(Json(
        permissions
            .into_iter()
            .map(PermissionResponse::from)
            .collect(),
    ))
}

/// GET /permissions/{id}
pub async fn get_permission(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<PermissionResponse>, ApiError> {
    require_permission(
        &state,
        &caller,
        Permission::new(Resource::Permission, Action::View),
    )
    .await?;
    let id = validate_id(id)?;

    let permission = state
        .store
        .permission_repo()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Permission"))?;

    Ok(Json(PermissionResponse::from(permission)))
}

/// GET /content-types
pub async fn list_content_types(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Query(query): Query<ContentTypeQuery>,
) -> Result<Json<Vec<ContentTypeResponse>>, ApiError> {
    require_permission(
        &state,
        &caller,
        Permission::new(Resource::ContentType, Action::View),
    )
    .await?;

    let content_types = ContentTypeResponse::all()
        .into_iter()
        .filter(|ct| query.name.as_deref().is_none_or(|name| ct.name == name))
        .filter(|ct| {
            query
                .app_label
                .as_deref()
                .is_none_or(|label| ct.app_label == label)
        })
        .collect();

    Ok(Json(content_types))
}
