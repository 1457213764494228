use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::{CurrentUser, require_permission};
use super::extract::JsonBody;
use super::types::AddressResponse;
use super::validation::validate_id;
use super::{ApiError, AppState};
use crate::db::{AddressChanges, AddressFilter, NewAddress};
use crate::domain::{Action, FieldErrors, Permission, Resource};

const FIELD_MAX: usize = 255;

#[derive(Debug, Deserialize)]
pub struct CreateAddressRequest {
    /// Owner; defaults to the caller.
    pub user: Option<i32>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub post_code: String,
    pub address: Option<String>,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub house_number: String,
    #[serde(default)]
    pub floor: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub is_default: bool,
}

const fn address_permission(action: Action) -> Permission {
    Permission::new(Resource::Address, action)
}

/// GET /addresses
pub async fn list_addresses(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Query(filter): Query<AddressFilter>,
) -> Result<Json<Vec<AddressResponse>>, ApiError> {
    require_permission(&state, &caller, address_permission(Action::View)).await?;

    let addresses = state.store.address_repo().list(&filter).await?;
    Ok(Json(
        addresses.into_iter().map(AddressResponse::from).collect(),
    ))
}

/// POST /addresses
pub async fn create_address(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    JsonBody(payload): JsonBody<CreateAddressRequest>,
) -> Result<(StatusCode, Json<AddressResponse>), ApiError> {
    require_permission(&state, &caller, address_permission(Action::Add)).await?;

    let mut errors = FieldErrors::new();
    let name = errors.require("name", payload.name.as_deref());
    let country = errors.require("country", payload.country.as_deref());
    let city = errors.require("city", payload.city.as_deref());
    let address = errors.require("address", payload.address.as_deref());
    for (field, value) in [("name", name), ("country", country), ("city", city)] {
        if let Some(value) = value {
            errors.max_length(field, value, FIELD_MAX);
        }
    }

    let user_id = payload.user.unwrap_or_else(|| caller.id());
    if state.store.get_user(user_id).await?.is_none() {
        errors.add(
            "user",
            format!("Invalid pk \"{user_id}\" - object does not exist."),
        );
    }

    errors.into_result()?;

    let new = NewAddress {
        user_id,
        name: name.unwrap_or_default().to_string(),
        country: country.unwrap_or_default().to_string(),
        city: city.unwrap_or_default().to_string(),
        state: payload.state,
        post_code: payload.post_code,
        address: address.unwrap_or_default().to_string(),
        street: payload.street,
        house_number: payload.house_number,
        floor: payload.floor,
        unit: payload.unit,
        is_default: payload.is_default,
    };

    let created = state.store.address_repo().create(new).await?;
    Ok((StatusCode::CREATED, Json(AddressResponse::from(created))))
}

/// GET /addresses/{id}
pub async fn get_address(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<AddressResponse>, ApiError> {
    require_permission(&state, &caller, address_permission(Action::View)).await?;
    let id = validate_id(id)?;

    let address = state
        .store
        .address_repo()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Address"))?;

    Ok(Json(AddressResponse::from(address)))
}

/// PATCH /addresses/{id}
pub async fn update_address(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<i32>,
    JsonBody(changes): JsonBody<AddressChanges>,
) -> Result<Json<AddressResponse>, ApiError> {
    require_permission(&state, &caller, address_permission(Action::Change)).await?;
    let id = validate_id(id)?;

    let mut errors = FieldErrors::new();
    for (field, value) in [
        ("name", &changes.name),
        ("country", &changes.country),
        ("city", &changes.city),
        ("address", &changes.address),
    ] {
        if value.is_some() {
            errors.require(field, value.as_deref());
        }
    }
    errors.into_result()?;

    let address = state
        .store
        .address_repo()
        .update(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Address"))?;

    Ok(Json(AddressResponse::from(address)))
}

/// DELETE /addresses/{id}
pub async fn delete_address(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    require_permission(&state, &caller, address_permission(Action::Delete)).await?;
    let id = validate_id(id)?;

    if !state.store.address_repo().delete(id).await? {
        return Err(ApiError::not_found("Address"));
    }
    Ok(StatusCode::NO_CONTENT)
}
