use anyhow::{Context, Result};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict};

use crate::entities::{auth_tokens, prelude::*};

pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Returns the user's token, creating one if none exists. The unique
    /// `user_id` index makes concurrent first logins converge on one key.
    pub async fn get_or_create(&self, user_id: i32) -> Result<String> {
        let active = auth_tokens::ActiveModel {
            key: Set(generate_token_key()),
            user_id: Set(user_id),
            created_at: Set(crate::db::now()),
        };

        AuthTokens::insert(active)
            .on_conflict(
                OnConflict::column(auth_tokens::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to insert token")?;

        let token = AuthTokens::find()
            .filter(auth_tokens::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to read back token")?
            .ok_or_else(|| anyhow::anyhow!("Token for user {user_id} missing after insert"))?;

        Ok(token.key)
    }

    /// Owner of `key`, if the key exists.
    pub async fn user_id_for(&self, key: &str) -> Result<Option<i32>> {
        let token = AuthTokens::find_by_id(key.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query token")?;
        Ok(token.map(|t| t.user_id))
    }

    pub async fn delete_for_user(&self, user_id: i32) -> Result<bool> {
        let result = AuthTokens::delete_many()
            .filter(auth_tokens::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete token")?;
        Ok(result.rows_affected > 0)
    }
}

/// Generate a random token key (40 character hex string)
#[must_use]
pub fn generate_token_key() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 20] = rng.random();

    bytes.iter().fold(String::with_capacity(40), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_keys_are_40_hex_chars() {
        let key = generate_token_key();
        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_token_key());
    }
}
