use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};

use crate::entities::{prelude::*, stars};

pub struct StarRepository {
    conn: DatabaseConnection,
}

impl StarRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// One star per user and post; starring again replaces the value.
    pub async fn upsert(&self, user_id: i32, post_id: i32, star: i32) -> Result<stars::Model> {
        let now = crate::db::now();
        let active = stars::ActiveModel {
            star: Set(star),
            user_id: Set(user_id),
            post_id: Set(post_id),
            created_at: Set(now.clone()),
            modified_at: Set(now),
            ..Default::default()
        };

        Stars::insert(active)
            .on_conflict(
                OnConflict::columns([stars::Column::UserId, stars::Column::PostId])
                    .update_columns([stars::Column::Star, stars::Column::ModifiedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to store star")?;

        Stars::find()
            .filter(stars::Column::UserId.eq(user_id))
            .filter(stars::Column::PostId.eq(post_id))
            .one(&self.conn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Star missing after upsert"))
    }

    pub async fn list_for_post(&self, post_id: i32) -> Result<Vec<stars::Model>> {
        Stars::find()
            .filter(stars::Column::PostId.eq(post_id))
            .order_by_asc(stars::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list stars")
    }

    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<stars::Model>> {
        Stars::find()
            .filter(stars::Column::UserId.eq(user_id))
            .order_by_asc(stars::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list user stars")
    }
}

/// Mean of the given stars, 0 when there are none.
#[must_use]
pub fn average(stars: &[stars::Model]) -> f64 {
    if stars.is_empty() {
        return 0.0;
    }
    let total: i64 = stars.iter().map(|s| i64::from(s.star)).sum();
    #[allow(clippy::cast_precision_loss)]
    let avg = total as f64 / stars.len() as f64;
    avg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star(value: i32) -> stars::Model {
        stars::Model {
            id: 0,
            star: value,
            user_id: 1,
            post_id: 1,
            created_at: String::new(),
            modified_at: String::new(),
        }
    }

    #[test]
    fn average_of_nothing_is_zero() {
        assert!((average(&[]) - 0.0).abs() < f64::EPSILON);
        assert!((average(&[star(4), star(5)]) - 4.5).abs() < f64::EPSILON);
    }
}
