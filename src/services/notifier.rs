//! Out-of-band delivery of verification codes.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::db::User;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Notifier rejected delivery with status {0}")]
    Rejected(u16),

    #[error("Notifier misconfigured: {0}")]
    Config(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Hands a freshly issued code to the user.
///
/// `code` is the plaintext the user reads; `verification_key` is the
/// ciphertext accepted by `GET /verify`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, user: &User, code: &str, verification_key: &str)
    -> Result<(), NotifyError>;
}

/// Logs each dispatch. Suitable for development and for deployments where an
/// operator relays codes by hand.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(
        &self,
        user: &User,
        code: &str,
        verification_key: &str,
    ) -> Result<(), NotifyError> {
        info!(
            user_id = user.id,
            mobile = %user.mobile,
            code = %code,
            verification_key = %verification_key,
            "Verification code dispatched"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    user_id: i32,
    username: Option<&'a str>,
    mobile: &'a str,
    email: &'a str,
    code: &'a str,
    verification_key: &'a str,
}

/// POSTs the code as JSON to an SMS/e-mail gateway.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Bookshelves/1.0")
            .build()
            .map_err(|e| NotifyError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(
        &self,
        user: &User,
        code: &str,
        verification_key: &str,
    ) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            user_id: user.id,
            username: user.username.as_deref(),
            mobile: &user.mobile,
            email: &user.email,
            code,
            verification_key,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }

        Ok(())
    }
}
