use axum::extract::rejection::{JsonDataError, JsonRejection};
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use super::ApiError;
use crate::domain::{FieldErrors, NON_FIELD_ERRORS};

/// Request body extractor whose rejections render like every other
/// validation failure: a 400 with messages keyed by field.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => ApiError::Validation(data_errors(&err)),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

/// The rejection text reads `<summary>: <path>: <serde message>`; the first
/// path segment names the offending field when serde reports one.
fn data_errors(err: &JsonDataError) -> FieldErrors {
    let text = err.body_text();
    let detail = text.split_once(": ").map_or(text.as_str(), |(_, rest)| rest);

    let (field, message) = match detail.split_once(": ") {
        Some((path, message)) if !path.is_empty() && !path.contains(' ') => {
            let field = path.split(['.', '[']).next().unwrap_or(path);
            (field, message)
        }
        _ => (NON_FIELD_ERRORS, detail),
    };

    let message = message
        .rsplit_once(" at line ")
        .map_or(message, |(message, _)| message);

    FieldErrors::single(field, format!("Invalid value: {message}."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{StatusCode, header};
    use axum::response::IntoResponse;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        name: Option<String>,
        count: Option<i32>,
    }

    fn request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn reject(body: &str) -> ApiError {
        match JsonBody::<Payload>::from_request(request(body), &()).await {
            Ok(_) => panic!("expected rejection for {body}"),
            Err(err) => err,
        }
    }

    #[tokio::test]
    async fn wrong_type_is_keyed_by_field() {
        let ApiError::Validation(errors) = reject(r#"{"name": 123}"#).await else {
            panic!("expected field errors");
        };
        let messages = errors.get("name").unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Invalid value: invalid type"));
        assert!(!messages[0].contains("line"));
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let err = reject(r#"{"name": "#).await;
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn accepts_well_typed_body() {
        let JsonBody(payload) = JsonBody::<Payload>::from_request(request(r#"{"count": 2}"#), &())
            .await
            .unwrap();
        assert_eq!(payload.count, Some(2));
        assert!(payload.name.is_none());
    }
}
