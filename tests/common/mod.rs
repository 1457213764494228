#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use bookshelves::api::AppState;
use bookshelves::config::Config;
use bookshelves::db::User;
use bookshelves::services::{NewAccount, Notifier, NotifyError, Registration};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Captures every delivered code instead of sending it anywhere.
#[derive(Default)]
pub struct RecordingNotifier {
    pub deliveries: Mutex<Vec<Delivery>>,
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub user_id: i32,
    pub code: String,
    pub verification_key: String,
}

impl RecordingNotifier {
    pub fn last_key_for(&self, user_id: i32) -> Option<String> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|d| d.user_id == user_id)
            .map(|d| d.verification_key.clone())
    }

    pub fn count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(
        &self,
        user: &User,
        code: &str,
        verification_key: &str,
    ) -> Result<(), NotifyError> {
        self.deliveries.lock().unwrap().push(Delivery {
            user_id: user.id,
            code: code.to_string(),
            verification_key: verification_key.to_string(),
        });
        Ok(())
    }
}

/// Remembers each key it was handed, then fails the delivery.
#[derive(Default)]
pub struct FailingNotifier {
    pub attempted_keys: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn deliver(
        &self,
        _user: &User,
        _code: &str,
        verification_key: &str,
    ) -> Result<(), NotifyError> {
        self.attempted_keys
            .lock()
            .unwrap()
            .push(verification_key.to_string());
        Err(NotifyError::Transport("connection refused".to_string()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub notifier: Arc<RecordingNotifier>,
    db_path: std::path::PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

pub fn test_config(db_path: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.observability.metrics_enabled = false;
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let notifier = Arc::new(RecordingNotifier::default());
    build_app(configure, notifier.clone(), notifier).await
}

/// An app whose every code delivery fails.
pub async fn spawn_app_with_failing_notifier() -> (TestApp, Arc<FailingNotifier>) {
    let failing = Arc::new(FailingNotifier::default());
    let app = build_app(
        |_| {},
        failing.clone(),
        Arc::new(RecordingNotifier::default()),
    )
    .await;
    (app, failing)
}

async fn build_app(
    configure: impl FnOnce(&mut Config),
    delivery: Arc<dyn Notifier>,
    notifier: Arc<RecordingNotifier>,
) -> TestApp {
    let db_path = std::env::temp_dir().join(format!("bookshelves-test-{}.db", uuid::Uuid::new_v4()));
    let mut config = test_config(&db_path);
    configure(&mut config);

    let state = bookshelves::api::create_app_state_with_notifier(config, delivery, None)
        .await
        .expect("Failed to create app state");
    let router = bookshelves::api::router(state.clone());

    TestApp {
        router,
        state,
        notifier,
        db_path,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Token {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("PATCH", uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("PUT", uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request("DELETE", uri, token, None).await
    }

    /// Registers through the API and returns the new user id.
    pub async fn register(&self, username: &str, mobile: &str, password: &str) -> i32 {
        let (status, body) = self
            .post(
                "/register",
                None,
                serde_json::json!({
                    "username": username,
                    "mobile": mobile,
                    "password": password,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");

        self.state
            .store
            .get_user_by_username(username)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    /// Registers, activates with the delivered code and logs in.
    pub async fn active_user(&self, username: &str, mobile: &str) -> (i32, String) {
        let id = self.register(username, mobile, "secret-pass").await;
        let key = self.notifier.last_key_for(id).unwrap();
        let (status, _) = self.get(&format!("/verify?code={key}"), None).await;
        assert_eq!(status, StatusCode::OK);
        (id, self.login(username, "secret-pass").await)
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .post(
                "/login",
                None,
                serde_json::json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Creates an active superuser directly through the account service.
    pub async fn superuser(&self, username: &str, mobile: &str) -> (i32, String) {
        let created = self
            .state
            .account_service
            .create_account(NewAccount {
                registration: Registration {
                    username: Some(username.to_string()),
                    mobile: Some(mobile.to_string()),
                    password: Some("admin-pass".to_string()),
                    ..Registration::default()
                },
                is_active: true,
                is_staff: true,
                is_superuser: true,
                ..NewAccount::default()
            })
            .await
            .unwrap();

        (created.user.id, self.login(username, "admin-pass").await)
    }
}
