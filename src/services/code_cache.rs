//! Ephemeral `ciphertext -> user id` store for pending verification codes.
//!
//! Entries expire on their own; nothing has to sweep them for correctness.
//! Redemption goes through [`CodeCache::take`] so a code can be used once.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::db::Store;
use crate::domain::UserId;

#[async_trait]
pub trait CodeCache: Send + Sync {
    async fn put(&self, key: &str, user_id: UserId, ttl: Duration) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<UserId>>;

    /// Atomic get-and-delete. At most one of several concurrent callers for
    /// the same key sees `Some`.
    async fn take(&self, key: &str) -> Result<Option<UserId>>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Process-local cache. Entries are lost on restart.
#[derive(Default)]
pub struct MemoryCodeCache {
    entries: Mutex<HashMap<String, (UserId, Instant)>>,
}

impl MemoryCodeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CodeCache for MemoryCodeCache {
    async fn put(&self, key: &str, user_id: UserId, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| anyhow::anyhow!("Verification code TTL out of range: {ttl:?}"))?;
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<UserId>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(user_id, _)| *user_id))
    }

    async fn take(&self, key: &str) -> Result<Option<UserId>> {
        let mut entries = self.entries.lock().await;
        Ok(entries
            .remove(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(user_id, _)| user_id))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Cache backed by the `verification_codes` table; survives restarts and is
/// shared by every process using the same database.
pub struct DatabaseCodeCache {
    store: Store,
}

impl DatabaseCodeCache {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CodeCache for DatabaseCodeCache {
    async fn put(&self, key: &str, user_id: UserId, ttl: Duration) -> Result<()> {
        let now = chrono::Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| anyhow::anyhow!("Verification code TTL out of range: {ttl:?}"))?;
        let repo = self.store.verification_repo();

        // Opportunistic cleanup
        if let Err(e) = repo.purge_expired(now).await {
            tracing::debug!(error = %e, "Failed to purge expired verification codes");
        }

        repo.put(key, user_id.value(), expires_at).await
    }

    async fn get(&self, key: &str) -> Result<Option<UserId>> {
        let user_id = self
            .store
            .verification_repo()
            .get(key, chrono::Utc::now())
            .await?;
        Ok(user_id.map(UserId::new))
    }

    async fn take(&self, key: &str) -> Result<Option<UserId>> {
        let user_id = self
            .store
            .verification_repo()
            .take(key, chrono::Utc::now())
            .await?;
        Ok(user_id.map(UserId::new))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.verification_repo().delete(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn memory_take_is_single_use() {
        let cache = MemoryCodeCache::new();
        cache
            .put("k", UserId::new(1), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(UserId::new(1)));
        assert_eq!(cache.take("k").await.unwrap(), Some(UserId::new(1)));
        assert_eq!(cache.take("k").await.unwrap(), None);
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_entries_expire() {
        let cache = MemoryCodeCache::new();
        cache
            .put("k", UserId::new(1), Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.take("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_ttl_is_an_error() {
        let cache = MemoryCodeCache::new();
        assert!(cache.put("k", UserId::new(1), Duration::MAX).await.is_err());
        assert_eq!(cache.get("k").await.unwrap(), None);

        let store = Store::new("sqlite::memory:").await.unwrap();
        let cache = DatabaseCodeCache::new(store);
        assert!(cache.put("k", UserId::new(1), Duration::MAX).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_takes_have_one_winner() {
        let cache = Arc::new(MemoryCodeCache::new());
        cache
            .put("k", UserId::new(9), Duration::from_secs(60))
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.take("k").await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn database_cache_round_trip() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let cache = DatabaseCodeCache::new(store);

        cache
            .put("k", UserId::new(3), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(UserId::new(3)));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.take("k").await.unwrap(), None);
    }
}
