//! Verification code issuance and redemption.
//!
//! A code is a random number from the configured range. The user receives
//! both the number and its sealed form; only the sealed form (the
//! verification key) is accepted for redemption and it doubles as the cache
//! key, so the plaintext is never stored.

use base64ct::{Base64UrlUnpadded, Encoding};
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::VerificationConfig;
use crate::db::{Store, User};
use crate::domain::UserId;
use crate::services::code_cache::CodeCache;
use crate::services::notifier::Notifier;

const NONCE_LEN: usize = 12;
const AAD: &[u8] = b"bookshelves-verification:v1";

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("verification code is empty")]
    EmptyCode,

    #[error("invalid verification code")]
    InvalidCode,

    #[error("user not found")]
    UserNotFound,

    #[error("Encryption failure: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for VerificationError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// What the notifier was given for one user.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub verification_key: String,
}

/// Seals codes with ChaCha20-Poly1305 under the process-wide key.
#[derive(Clone)]
pub struct CodeCipher {
    cipher: ChaCha20Poly1305,
}

impl CodeCipher {
    #[must_use]
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Cipher with a random key; keys sealed by it die with the process.
    #[must_use]
    pub fn ephemeral() -> Self {
        let key: [u8; 32] = rand::rng().random();
        Self::new(&key)
    }

    /// Returns `base64url(nonce || ciphertext)` without padding.
    pub fn seal(&self, plaintext: &str) -> Result<String, VerificationError> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::rng().random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: AAD,
                },
            )
            .map_err(|e| VerificationError::Crypto(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);

        Ok(Base64UrlUnpadded::encode_string(&out))
    }

    /// Reverses [`CodeCipher::seal`]; `None` for anything not sealed by this key.
    #[must_use]
    pub fn open(&self, key: &str) -> Option<String> {
        let data = Base64UrlUnpadded::decode_vec(key).ok()?;
        if data.len() <= NONCE_LEN {
            return None;
        }

        let (nonce_bytes, sealed) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: sealed,
                    aad: AAD,
                },
            )
            .ok()?;

        String::from_utf8(plaintext).ok()
    }
}

pub struct VerificationService {
    store: Store,
    cache: Arc<dyn CodeCache>,
    notifier: Arc<dyn Notifier>,
    cipher: CodeCipher,
    config: VerificationConfig,
}

impl VerificationService {
    #[must_use]
    pub fn new(
        store: Store,
        cache: Arc<dyn CodeCache>,
        notifier: Arc<dyn Notifier>,
        cipher: CodeCipher,
        config: VerificationConfig,
    ) -> Self {
        Self {
            store,
            cache,
            notifier,
            cipher,
            config,
        }
    }

    fn generate_code(&self) -> String {
        rand::rng()
            .random_range(self.config.code_min..=self.config.code_max)
            .to_string()
    }

    /// Issues one code for a freshly created user and hands it to the
    /// notifier. A failed delivery is logged and counted but not returned:
    /// the account exists either way and `issue-code` can re-send.
    pub async fn issue(&self, user: &User) -> Result<IssuedCode, VerificationError> {
        let code = self.generate_code();
        let verification_key = self.cipher.seal(&code)?;

        self.cache
            .put(
                &verification_key,
                UserId::new(user.id),
                Duration::from_secs(self.config.ttl_seconds),
            )
            .await?;

        metrics::counter!("verification_codes_issued_total").increment(1);

        if let Err(e) = self
            .notifier
            .deliver(user, &code, &verification_key)
            .await
        {
            metrics::counter!("verification_delivery_failures_total").increment(1);
            warn!(
                user_id = user.id,
                error = %e,
                "Verification code delivery failed"
            );
        }

        Ok(IssuedCode {
            code,
            verification_key,
        })
    }

    /// Consumes `key` and activates its owner.
    pub async fn redeem(&self, key: Option<&str>) -> Result<User, VerificationError> {
        let key = key.map(str::trim).unwrap_or_default();
        if key.is_empty() {
            return Err(VerificationError::EmptyCode);
        }

        if self.cipher.open(key).is_none() {
            return Err(VerificationError::InvalidCode);
        }

        let user_id = self
            .cache
            .take(key)
            .await?
            .ok_or(VerificationError::InvalidCode)?;

        let repo = self.store.user_repo();
        if !repo.set_active(user_id.value(), true).await? {
            return Err(VerificationError::UserNotFound);
        }

        let user = repo
            .get_by_id(user_id.value())
            .await?
            .ok_or(VerificationError::UserNotFound)?;

        metrics::counter!("accounts_activated_total").increment(1);
        info!(user_id = user.id, "Account activated");

        Ok(user)
    }
}
