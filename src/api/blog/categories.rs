use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::CategoryResponse;
use crate::api::auth::{CurrentUser, require_permission};
use crate::api::extract::JsonBody;
use crate::api::validation::{CATEGORY_NAME_MAX, double_option, required_text};
use crate::api::{ApiError, AppState};
use crate::db::{CategoryChanges, unique_violation};
use crate::domain::{Action, FieldErrors, Permission, Resource};
use crate::entities::categories;

const DUPLICATE_CATEGORY: &str = "category with this name and parent already exists.";

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: Option<String>,
    pub parent: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent: Option<Option<i32>>,
}

const fn category_permission(action: Action) -> Permission {
    Permission::new(Resource::Category, action)
}

fn map_unique(err: anyhow::Error) -> ApiError {
    if unique_violation(&err).is_some() {
        ApiError::field("name", DUPLICATE_CATEGORY)
    } else {
        ApiError::from(err)
    }
}

async fn find_category(state: &AppState, lookup: &str) -> Result<categories::Model, ApiError> {
    state
        .store
        .category_repo()
        .find(lookup)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))
}

async fn check_parent(
    state: &AppState,
    errors: &mut FieldErrors,
    parent: Option<i32>,
) -> Result<(), ApiError> {
    if let Some(id) = parent
        && state.store.category_repo().get(id).await?.is_none()
    {
        errors.add(
            "parent",
            format!("Invalid pk \"{id}\" - object does not exist."),
        );
    }
    Ok(())
}

/// GET /blog/categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let categories = state.store.category_repo().list().await?;
    Ok(Json(
        categories.into_iter().map(CategoryResponse::from).collect(),
    ))
}

/// POST /blog/categories
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    JsonBody(payload): JsonBody<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    require_permission(&state, &caller, category_permission(Action::Add)).await?;

    let mut errors = FieldErrors::new();
    let name = required_text(
        &mut errors,
        "name",
        payload.name.as_deref(),
        CATEGORY_NAME_MAX,
    );
    check_parent(&state, &mut errors, payload.parent).await?;
    errors.into_result()?;
    let Some(name) = name else {
        return Err(ApiError::field("name", crate::domain::REQUIRED));
    };

    let category = state
        .store
        .category_repo()
        .create(&name, payload.parent)
        .await
        .map_err(map_unique)?;

    Ok((StatusCode::CREATED, Json(CategoryResponse::from(category))))
}

/// GET /blog/categories/{category}
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(lookup): Path<String>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let category = find_category(&state, &lookup).await?;
    Ok(Json(CategoryResponse::from(category)))
}

/// PUT /blog/categories/{category}
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(lookup): Path<String>,
    JsonBody(payload): JsonBody<UpdateCategoryRequest>,
) -> Result<Json<CategoryResponse>, ApiError> {
    require_permission(&state, &caller, category_permission(Action::Change)).await?;
    let category = find_category(&state, &lookup).await?;

    let mut errors = FieldErrors::new();
    let name = match payload.name.as_deref() {
        Some(_) => required_text(
            &mut errors,
            "name",
            payload.name.as_deref(),
            CATEGORY_NAME_MAX,
        ),
        None => None,
    };
    let parent = payload.parent.flatten();
    if parent == Some(category.id) {
        errors.add("parent", "A category cannot be its own parent.");
    }
    check_parent(&state, &mut errors, parent).await?;
    errors.into_result()?;

    let updated = state
        .store
        .category_repo()
        .update(
            category.id,
            CategoryChanges {
                name,
                parent_id: payload.parent,
            },
        )
        .await
        .map_err(map_unique)?
        .ok_or_else(|| ApiError::not_found("Category"))?;

    Ok(Json(CategoryResponse::from(updated)))
}

/// DELETE /blog/categories/{category}
/// Posts in the category move to the configured fallback category.
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(lookup): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_permission(&state, &caller, category_permission(Action::Delete)).await?;
    let category = find_category(&state, &lookup).await?;

    let fallback = &state.config.blog.deleted_post_category;
    if category.parent_id.is_none() && &category.name == fallback {
        return Err(ApiError::BadRequest(format!(
            "The '{fallback}' category holds posts of deleted categories and cannot be deleted"
        )));
    }

    if !state
        .store
        .category_repo()
        .soft_delete(category.id, fallback)
        .await?
    {
        return Err(ApiError::not_found("Category"));
    }

    tracing::info!(
        category_id = category.id,
        fallback = %fallback,
        "Category deleted, posts moved"
    );
    Ok(StatusCode::NO_CONTENT)
}
