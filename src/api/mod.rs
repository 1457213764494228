use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, patch, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::Store;

mod accounts;
mod addresses;
pub mod auth;
mod blog;
mod error;
mod extract;
mod groups;
mod health;
mod observability;
mod permissions;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use types::*;

use crate::services::{
    AccountService, AuthService, CodeCache, CodeCipher, DatabaseCodeCache, LogNotifier,
    MemoryCodeCache, Notifier, SeaOrmAccountService, SeaOrmAuthService, VerificationService,
    WebhookNotifier,
};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,

    pub config: Arc<Config>,

    pub auth_service: Arc<dyn AuthService>,

    pub account_service: Arc<dyn AccountService>,

    pub verification: Arc<VerificationService>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

/// Builds the state with the notifier named in `verification.notifier`.
pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let notifier: Arc<dyn Notifier> = match config.verification.notifier.as_str() {
        "webhook" => Arc::new(WebhookNotifier::new(
            &config.verification.webhook_url,
            Duration::from_secs(config.verification.webhook_timeout_seconds),
        )?),
        _ => Arc::new(LogNotifier),
    };

    create_app_state_with_notifier(config, notifier, prometheus_handle).await
}

pub async fn create_app_state_with_notifier(
    config: Config,
    notifier: Arc<dyn Notifier>,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let cipher = if let Some(key) = config.verification.decode_secret_key()? {
        CodeCipher::new(&key)
    } else {
        warn!("verification.secret_key is empty, using a random key for this process");
        CodeCipher::ephemeral()
    };

    let cache: Arc<dyn CodeCache> = match config.verification.cache_backend.as_str() {
        "database" => Arc::new(DatabaseCodeCache::new(store.clone())),
        _ => Arc::new(MemoryCodeCache::new()),
    };
    info!(
        backend = %config.verification.cache_backend,
        notifier = %config.verification.notifier,
        "Verification code cache ready"
    );

    let verification = Arc::new(VerificationService::new(
        store.clone(),
        cache,
        notifier,
        cipher,
        config.verification.clone(),
    ));

    let auth_service = Arc::new(SeaOrmAuthService::new(
        store.clone(),
        config.security.clone(),
    ));

    let account_service = Arc::new(SeaOrmAccountService::new(
        store.clone(),
        verification.clone(),
        config.accounts.clone(),
        config.security.clone(),
    )?);

    Ok(Arc::new(AppState {
        store,
        config: Arc::new(config),
        auth_service,
        account_service,
        verification,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();

    let protected_routes = create_protected_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/register", post(accounts::register))
        .route("/login", post(accounts::login))
        .route("/verify", get(accounts::verify))
        .route("/health", get(health::health_check))
        .route("/metrics", get(observability::get_metrics))
        .nest("/blog", blog::router())
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    api_router
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/logout", get(accounts::logout))
        .route("/password", patch(accounts::change_password))
        .route("/me", get(accounts::get_me).patch(accounts::update_me))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route(
            "/groups/{id}",
            get(groups::get_group)
                .patch(groups::update_group)
                .delete(groups::delete_group),
        )
        .route("/permissions", get(permissions::list_permissions))
        .route("/permissions/{id}", get(permissions::get_permission))
        .route("/content-types", get(permissions::list_content_types))
        .route(
            "/addresses",
            get(addresses::list_addresses).post(addresses::create_address),
        )
        .route(
            "/addresses/{id}",
            get(addresses::get_address)
                .patch(addresses::update_address)
                .delete(addresses::delete_address),
        )
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
