use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict};

use crate::db::timestamp;
use crate::entities::{prelude::*, verification_codes};

/// Persistent storage for pending verification codes.
pub struct VerificationRepository {
    conn: DatabaseConnection,
}

impl VerificationRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn put(&self, code: &str, user_id: i32, expires_at: DateTime<Utc>) -> Result<()> {
        let active = verification_codes::ActiveModel {
            code: Set(code.to_string()),
            user_id: Set(user_id),
            expires_at: Set(timestamp(expires_at)),
            created_at: Set(crate::db::now()),
        };

        VerificationCodes::insert(active)
            .on_conflict(
                OnConflict::column(verification_codes::Column::Code)
                    .update_columns([
                        verification_codes::Column::UserId,
                        verification_codes::Column::ExpiresAt,
                        verification_codes::Column::CreatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to store verification code")?;

        Ok(())
    }

    /// Owner of a live (unexpired) code.
    pub async fn get(&self, code: &str, now: DateTime<Utc>) -> Result<Option<i32>> {
        let row = VerificationCodes::find()
            .filter(verification_codes::Column::Code.eq(code))
            .filter(verification_codes::Column::ExpiresAt.gt(timestamp(now)))
            .one(&self.conn)
            .await
            .context("Failed to query verification code")?;

        Ok(row.map(|r| r.user_id))
    }

    /// Atomic get-and-delete: of several concurrent callers only the one whose
    /// `DELETE` affects the row gets the owner back.
    pub async fn take(&self, code: &str, now: DateTime<Utc>) -> Result<Option<i32>> {
        let Some(user_id) = self.get(code, now).await? else {
            return Ok(None);
        };

        let result = VerificationCodes::delete_many()
            .filter(verification_codes::Column::Code.eq(code))
            .filter(verification_codes::Column::ExpiresAt.gt(timestamp(now)))
            .exec(&self.conn)
            .await
            .context("Failed to consume verification code")?;

        Ok((result.rows_affected == 1).then_some(user_id))
    }

    pub async fn delete(&self, code: &str) -> Result<bool> {
        let result = VerificationCodes::delete_by_id(code.to_string())
            .exec(&self.conn)
            .await
            .context("Failed to delete verification code")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = VerificationCodes::delete_many()
            .filter(verification_codes::Column::ExpiresAt.lte(timestamp(now)))
            .exec(&self.conn)
            .await
            .context("Failed to purge expired verification codes")?;
        Ok(result.rows_affected)
    }
}
