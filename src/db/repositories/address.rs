use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use serde::Deserialize;

use crate::entities::{addresses, prelude::*};

#[derive(Debug, Clone, Default)]
pub struct NewAddress {
    pub user_id: i32,
    pub name: String,
    pub country: String,
    pub city: String,
    pub state: String,
    pub post_code: String,
    pub address: String,
    pub street: String,
    pub house_number: String,
    pub floor: String,
    pub unit: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressChanges {
    pub name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub post_code: Option<String>,
    pub address: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub floor: Option<String>,
    pub unit: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressFilter {
    pub country: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub post_code: Option<String>,
}

pub struct AddressRepository {
    conn: DatabaseConnection,
}

impl AddressRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self, filter: &AddressFilter) -> Result<Vec<addresses::Model>> {
        let mut cond = Condition::all();
        if let Some(v) = &filter.country {
            cond = cond.add(addresses::Column::Country.eq(v.as_str()));
        }
        if let Some(v) = &filter.city {
            cond = cond.add(addresses::Column::City.eq(v.as_str()));
        }
        if let Some(v) = &filter.state {
            cond = cond.add(addresses::Column::State.eq(v.as_str()));
        }
        if let Some(v) = &filter.post_code {
            cond = cond.add(addresses::Column::PostCode.eq(v.as_str()));
        }

        Addresses::find()
            .filter(cond)
            .order_by_asc(addresses::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list addresses")
    }

    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<addresses::Model>> {
        Addresses::find()
            .filter(addresses::Column::UserId.eq(user_id))
            .order_by_asc(addresses::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list user addresses")
    }

    pub async fn get(&self, id: i32) -> Result<Option<addresses::Model>> {
        Addresses::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query address")
    }

    pub async fn create(&self, new: NewAddress) -> Result<addresses::Model> {
        let active = addresses::ActiveModel {
            user_id: Set(new.user_id),
            name: Set(new.name),
            country: Set(new.country),
            city: Set(new.city),
            state: Set(new.state),
            post_code: Set(new.post_code),
            address: Set(new.address),
            street: Set(new.street),
            house_number: Set(new.house_number),
            floor: Set(new.floor),
            unit: Set(new.unit),
            is_default: Set(new.is_default),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert address")
    }

    pub async fn update(&self, id: i32, changes: AddressChanges) -> Result<Option<addresses::Model>> {
        let Some(row) = self.get(id).await? else {
            return Ok(None);
        };

        let mut active: addresses::ActiveModel = row.into();
        if let Some(v) = changes.name {
            active.name = Set(v);
        }
        if let Some(v) = changes.country {
            active.country = Set(v);
        }
        if let Some(v) = changes.city {
            active.city = Set(v);
        }
        if let Some(v) = changes.state {
            active.state = Set(v);
        }
        if let Some(v) = changes.post_code {
            active.post_code = Set(v);
        }
        if let Some(v) = changes.address {
            active.address = Set(v);
        }
        if let Some(v) = changes.street {
            active.street = Set(v);
        }
        if let Some(v) = changes.house_number {
            active.house_number = Set(v);
        }
        if let Some(v) = changes.floor {
            active.floor = Set(v);
        }
        if let Some(v) = changes.unit {
            active.unit = Set(v);
        }
        if let Some(v) = changes.is_default {
            active.is_default = Set(v);
        }

        Ok(Some(
            active
                .update(&self.conn)
                .await
                .context("Failed to update address")?,
        ))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Addresses::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete address")?;
        Ok(result.rows_affected > 0)
    }
}
