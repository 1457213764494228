use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::extract::JsonBody;
use super::types::{AddressResponse, MessageResponse, ProfileResponse, RegisterResponse};
use super::{ApiError, AppState};
use crate::services::{AccountUpdate, LoginResult, PasswordChange, Registration};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    pub code: Option<String>,
}

/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<Registration>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let created = state.account_service.register(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse::from(&created.user)),
    ))
}

/// POST /login
/// Exchange username and password for the account's token
pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<LoginResult>, ApiError> {
    let result = state
        .auth_service
        .login(payload.username.as_deref(), payload.password.as_deref())
        .await?;

    Ok(Json(result))
}

/// GET /logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.auth_service.logout(&user.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /verify?code=
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.verification.redeem(query.code.as_deref()).await?;

    Ok(Json(MessageResponse::new(
        "user has been successfully activated",
    )))
}

/// PATCH /password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    JsonBody(payload): JsonBody<PasswordChange>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth_service.change_password(&user.0, payload).await?;

    Ok(Json(MessageResponse::new("password has been updated")))
}

/// GET /me
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    profile(&state, user.id()).await.map(Json)
}

/// PATCH /me
/// Only profile fields are honoured; flags and memberships are ignored.
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    JsonBody(payload): JsonBody<AccountUpdate>,
) -> Result<Json<ProfileResponse>, ApiError> {
    state
        .account_service
        .update_account(user.id(), payload.profile_only())
        .await?;

    profile(&state, user.id()).await.map(Json)
}

async fn profile(state: &AppState, id: i32) -> Result<ProfileResponse, ApiError> {
    let repo = state.store.user_repo();
    let user = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let groups = repo.group_ids(id).await?;
    let permissions = repo.permission_ids(id).await?;
    let addresses = state
        .store
        .address_repo()
        .list_for_user(id)
        .await?
        .into_iter()
        .map(AddressResponse::from)
        .collect();

    Ok(ProfileResponse {
        id: user.id,
        username: user.username,
        mobile: user.mobile,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        image: user.image,
        groups,
        addresses,
        permissions,
        is_active: user.is_active,
        last_login: user.last_login,
        date_joined: user.date_joined,
    })
}
