use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::error::NOT_AUTHENTICATED;
use super::{ApiError, AppState};
use crate::db::User;
use crate::domain::Permission;

/// The authenticated caller, resolved from the request's token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    #[must_use]
    pub const fn id(&self) -> i32 {
        self.0.id
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Token authentication for fully protected routes. Accepts
/// `Authorization: Token <key>` or `Authorization: Bearer <key>` and stores
/// the caller as a request extension.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, request.headers()).await?;
    tracing::Span::current().record("user_id", user.id);
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let user = authenticate(state, &parts.headers).await?;
        tracing::Span::current().record("user_id", user.id);
        Ok(CurrentUser(user))
    }
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let Some(token) = extract_token(headers) else {
        return Err(ApiError::Unauthenticated(NOT_AUTHENTICATED.to_string()));
    };

    Ok(state.auth_service.authenticate(&token).await?)
}

/// Extract the token key from the `Authorization` header
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get("Authorization")?.to_str().ok()?;

    let token = auth_str
        .strip_prefix("Token ")
        .or_else(|| auth_str.strip_prefix("Bearer "))?
        .trim();

    (!token.is_empty()).then(|| token.to_string())
}

// ============================================================================
// Helpers
// ============================================================================

/// Fails with 403 unless the caller holds `permission` (superusers hold all).
pub async fn require_permission(
    state: &AppState,
    user: &CurrentUser,
    permission: Permission,
) -> Result<(), ApiError> {
    if state.store.user_has_permission(&user.0, permission).await? {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}
