use serde::Serialize;

use crate::db::User;
use crate::domain::Resource;
use crate::entities::{addresses, groups, permissions};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub username: Option<String>,
    pub email: String,
    pub mobile: String,
}

impl From<&User> for RegisterResponse {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            mobile: user.mobile.clone(),
        }
    }
}

/// Administrative user representation.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: Option<String>,
    pub mobile: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub image: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub mobile_verified: bool,
    pub email_verified: bool,
    pub groups: Vec<i32>,
    pub permissions: Vec<i32>,
    pub last_login: Option<String>,
    pub date_joined: String,
}

impl UserResponse {
    #[must_use]
    pub fn new(user: User, groups: Vec<i32>, permissions: Vec<i32>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            mobile: user.mobile,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            image: user.image,
            is_active: user.is_active,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            mobile_verified: user.mobile_verified,
            email_verified: user.email_verified,
            groups,
            permissions,
            last_login: user.last_login,
            date_joined: user.date_joined,
        }
    }
}

/// The caller's own representation (`/me`).
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: i32,
    pub username: Option<String>,
    pub mobile: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub image: String,
    pub groups: Vec<i32>,
    pub addresses: Vec<AddressResponse>,
    pub permissions: Vec<i32>,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub date_joined: String,
}

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub id: i32,
    pub name: String,
    pub permissions: Vec<i32>,
}

impl GroupResponse {
    #[must_use]
    pub fn new(group: groups::Model, permissions: Vec<i32>) -> Self {
        Self {
            id: group.id,
            name: group.name,
            permissions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub id: i32,
    pub name: String,
    pub codename: String,
    pub content_type: Option<i32>,
}

impl From<permissions::Model> for PermissionResponse {
    fn from(p: permissions::Model) -> Self {
        let content_type = ContentTypeResponse::all()
            .into_iter()
            .find(|ct| ct.app_label == p.app_label && ct.model == p.model)
            .map(|ct| ct.id);

        Self {
            id: p.id,
            name: p.name,
            codename: p.codename,
            content_type,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentTypeResponse {
    pub id: i32,
    pub app_label: &'static str,
    pub model: &'static str,
    pub name: &'static str,
}

impl ContentTypeResponse {
    /// One entry per model, numbered in declaration order.
    #[must_use]
    pub fn all() -> Vec<Self> {
        Resource::ALL
            .iter()
            .zip(1..)
            .map(|(resource, id)| Self {
                id,
                app_label: resource.app_label(),
                model: resource.model(),
                name: resource.verbose_name(),
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub id: i32,
    pub user: i32,
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

impl From<addresses::Model> for AddressResponse {
    fn from(a: addresses::Model) -> Self {
        Self {
            id: a.id,
            user: a.user_id,
            name: a.name,
            country: a.country,
            city: a.city,
            state: a.state,
            post_code: a.post_code,
            address: a.address,
            street: a.street,
            house_number: a.house_number,
            floor: a.floor,
            unit: a.unit,
            is_default: a.is_default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_are_numbered_from_one() {
        let all = ContentTypeResponse::all();
        assert_eq!(all.len(), Resource::ALL.len());
        assert_eq!(all[0].id, 1);
        assert_eq!(all[0].model, "user");
        assert!(all.iter().any(|ct| ct.name == "content type"));
    }
}
