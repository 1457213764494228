use crate::api::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Literal path segments of the API. Anything else in a path is an id or a
/// name lookup and is folded into `{key}`.
const STATIC_SEGMENTS: &[&str] = &[
    "register",
    "login",
    "logout",
    "verify",
    "password",
    "me",
    "users",
    "groups",
    "permissions",
    "content-types",
    "addresses",
    "health",
    "metrics",
    "blog",
    "posts",
    "tags",
    "categories",
    "comments",
    "replies",
    "approve",
    "bookmark",
    "bookmarks",
    "stars",
];

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.prometheus_handle.as_ref().map_or_else(
        || "Metrics not enabled or failed to initialize".to_string(),
        metrics_exporter_prometheus::PrometheusHandle::render,
    )
}

/// Template for a path no route matched, e.g. `/blog/posts/7/nope` becomes
/// `/blog/posts/{key}/{key}`.
fn route_template(path: &str) -> String {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if STATIC_SEGMENTS.contains(&s) {
                s
            } else {
                "{key}"
            }
        })
        .collect();

    format!("/{}", segments.join("/"))
}

/// Which part of the API a path belongs to.
fn route_area(path: &str) -> &'static str {
    let first = path.trim_start_matches('/').split('/').next().unwrap_or("");
    match first {
        "blog" => "blog",
        "register" | "login" | "logout" | "verify" | "password" | "me" => "accounts",
        "users" | "groups" | "permissions" | "content-types" | "addresses" => "admin",
        "health" | "metrics" => "system",
        _ => "unknown",
    }
}

/// Wraps every request in a span carrying a fresh request id, echoed back in
/// `x-request-id`. The auth layer fills in `user_id` once the caller is known.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let area = route_area(&path);

    // Unmatched paths carry no MatchedPath.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| route_template(&path), |mp| mp.as_str().to_string());

    let user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
        route = %route,
        area,
        user_id = tracing::field::Empty,
    );

    async move {
        let mut response = next.run(req).await;

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let status = response.status().as_u16();

        let labels = [
            ("method", method),
            ("area", area.to_string()),
            ("path", route),
            ("status", status.to_string()),
        ];

        metrics::counter!("http_requests_total", &labels).increment(1);
        metrics::histogram!("http_request_duration_seconds", &labels)
            .record(start.elapsed().as_secs_f64());

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        if status >= 500 {
            warn!(
                event = "http_request_failed",
                duration_ms,
                status_code = status,
                user_agent = %user_agent,
                "Request failed"
            );
        } else {
            let outcome = if status >= 400 { "client_error" } else { "success" };
            info!(
                event = "http_request_finished",
                duration_ms,
                status_code = status,
                user_agent = %user_agent,
                outcome,
                "Request finished"
            );
        }

        response
    }
    .instrument(span)
    .await
}
