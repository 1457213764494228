use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::domain::FieldErrors;
use crate::services::{AccountError, AuthError, VerificationError};

pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";
pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";

#[derive(Debug)]
pub enum ApiError {
    /// 400 with a `{"field": ["message"]}` body.
    Validation(FieldErrors),

    /// 400 with a `{"message": ...}` body.
    BadRequest(String),

    /// 401 with a `{"message": ...}` body (login/password checks).
    Unauthorized(String),

    /// 401 with a `{"detail": ...}` body (token authentication).
    Unauthenticated(String),

    Forbidden(String),

    NotFound(String),

    DatabaseError(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(errors) => write!(f, "Validation error: {}", errors),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = |status: StatusCode, msg: String| (status, Json(json!({ "message": msg })));

        match self {
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            ApiError::BadRequest(msg) => message(StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Unauthorized(msg) => message(StatusCode::UNAUTHORIZED, msg).into_response(),
            ApiError::Unauthenticated(detail) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Forbidden(msg) => message(StatusCode::FORBIDDEN, msg).into_response(),
            ApiError::NotFound(msg) => message(StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                message(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
                .into_response()
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                message(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
                .into_response()
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(format!("{err:#}"))
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(errors) => ApiError::Validation(errors),
            AuthError::InvalidCredentials | AuthError::NotActivated => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::InvalidToken | AuthError::InactiveUser => {
                ApiError::Unauthenticated(err.to_string())
            }
            AuthError::PermissionDenied => ApiError::Forbidden(err.to_string()),
            AuthError::UserNotFound => ApiError::NotFound(err.to_string()),
            AuthError::Database(msg) => ApiError::DatabaseError(msg),
            AuthError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(errors) => ApiError::Validation(errors),
            AccountError::UserNotFound => ApiError::not_found("User"),
            AccountError::Database(msg) => ApiError::DatabaseError(msg),
            AccountError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::EmptyCode | VerificationError::InvalidCode => {
                ApiError::BadRequest(err.to_string())
            }
            VerificationError::UserNotFound => ApiError::NotFound(err.to_string()),
            VerificationError::Crypto(msg) | VerificationError::Internal(msg) => {
                ApiError::InternalError(msg)
            }
        }
    }
}

impl ApiError {
    /// `"<Entity> with your value does not exist"`
    pub fn not_found(entity: &str) -> Self {
        ApiError::NotFound(format!("{} with your value does not exist", entity))
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden(PERMISSION_DENIED.to_string())
    }

    pub fn field(field: &str, msg: impl Into<String>) -> Self {
        ApiError::Validation(FieldErrors::single(field, msg))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_statuses() {
        let cases = [
            (ApiError::from(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (ApiError::from(AuthError::NotActivated), StatusCode::UNAUTHORIZED),
            (ApiError::from(AuthError::InvalidToken), StatusCode::UNAUTHORIZED),
            (ApiError::from(AuthError::PermissionDenied), StatusCode::FORBIDDEN),
            (ApiError::from(AuthError::UserNotFound), StatusCode::NOT_FOUND),
            (
                ApiError::from(VerificationError::EmptyCode),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(VerificationError::UserNotFound),
                StatusCode::NOT_FOUND,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn not_found_message() {
        let ApiError::NotFound(msg) = ApiError::not_found("Post") else {
            panic!("expected NotFound");
        };
        assert_eq!(msg, "Post with your value does not exist");
    }
}
