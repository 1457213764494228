//! Typed capability table.
//!
//! Every permission the service knows about is a `(Resource, Action)` pair.
//! Configuration names them as `"app.model.action"` strings, which are parsed
//! while the config is deserialized so a typo fails at startup instead of at
//! grant time. The `permissions` table is synchronised from [`Permission::all`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    User,
    Address,
    Group,
    Permission,
    ContentType,
    Post,
    Tag,
    Category,
    Comment,
    Star,
}

impl Resource {
    pub const ALL: [Self; 10] = [
        Self::User,
        Self::Address,
        Self::Group,
        Self::Permission,
        Self::ContentType,
        Self::Post,
        Self::Tag,
        Self::Category,
        Self::Comment,
        Self::Star,
    ];

    #[must_use]
    pub const fn app_label(self) -> &'static str {
        match self {
            Self::User | Self::Address => "account",
            Self::Group | Self::Permission => "auth",
            Self::ContentType => "contenttypes",
            Self::Post | Self::Tag | Self::Category | Self::Comment | Self::Star => "blog",
        }
    }

    #[must_use]
    pub const fn model(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Address => "address",
            Self::Group => "group",
            Self::Permission => "permission",
            Self::ContentType => "contenttype",
            Self::Post => "post",
            Self::Tag => "tag",
            Self::Category => "category",
            Self::Comment => "comment",
            Self::Star => "star",
        }
    }

    /// Human readable model name.
    #[must_use]
    pub const fn verbose_name(self) -> &'static str {
        match self {
            Self::ContentType => "content type",
            other => other.model(),
        }
    }

    #[must_use]
    pub fn from_parts(app_label: &str, model: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.app_label() == app_label && r.model().eq_ignore_ascii_case(model))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Add,
    Change,
    Delete,
    View,
}

impl Action {
    pub const ALL: [Self; 4] = [Self::Add, Self::Change, Self::Delete, Self::View];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Change => "change",
            Self::Delete => "delete",
            Self::View => "view",
        }
    }
}

impl FromStr for Action {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| PermissionParseError::UnknownAction(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionParseError {
    #[error("expected 'app.model.action', got '{0}'")]
    Malformed(String),

    #[error("unknown model '{app_label}.{model}'")]
    UnknownModel { app_label: String, model: String },

    #[error("unknown action '{0}'")]
    UnknownAction(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    #[must_use]
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }

    /// Every permission in the capability table.
    pub fn all() -> impl Iterator<Item = Self> {
        Resource::ALL.into_iter().flat_map(|resource| {
            Action::ALL
                .into_iter()
                .map(move |action| Self::new(resource, action))
        })
    }

    /// Codename as stored in the permission table, e.g. `change_user`.
    #[must_use]
    pub fn codename(&self) -> String {
        format!("{}_{}", self.action.as_str(), self.resource.model())
    }

    /// Display name, e.g. `Can change user`.
    #[must_use]
    pub fn name(&self) -> String {
        format!(
            "Can {} {}",
            self.action.as_str(),
            self.resource.verbose_name()
        )
    }

    #[must_use]
    pub fn from_codename(codename: &str) -> Option<Self> {
        Self::all().find(|p| p.codename() == codename)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.resource.app_label(),
            self.resource.model(),
            self.action.as_str()
        )
    }
}

impl FromStr for Permission {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        let [app_label, model, action] = parts.as_slice() else {
            return Err(PermissionParseError::Malformed(s.to_string()));
        };

        let resource = Resource::from_parts(app_label, model).ok_or_else(|| {
            PermissionParseError::UnknownModel {
                app_label: (*app_label).to_string(),
                model: (*model).to_string(),
            }
        })?;

        Ok(Self::new(resource, action.parse()?))
    }
}

impl TryFrom<String> for Permission {
    type Error = PermissionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        permission.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_permission() {
        let p: Permission = "account.user.change".parse().unwrap();
        assert_eq!(p, Permission::new(Resource::User, Action::Change));
        assert_eq!(p.codename(), "change_user");
        assert_eq!(p.to_string(), "account.user.change");
    }

    #[test]
    fn model_lookup_is_case_insensitive() {
        let p: Permission = "blog.Post.add".parse().unwrap();
        assert_eq!(p, Permission::new(Resource::Post, Action::Add));
    }

    #[test]
    fn rejects_unknown_parts() {
        assert!(matches!(
            "blog.post".parse::<Permission>(),
            Err(PermissionParseError::Malformed(_))
        ));
        assert!(matches!(
            "blog.video.add".parse::<Permission>(),
            Err(PermissionParseError::UnknownModel { .. })
        ));
        assert!(matches!(
            "blog.post.publish".parse::<Permission>(),
            Err(PermissionParseError::UnknownAction(_))
        ));
    }

    #[test]
    fn codenames_are_unique() {
        let mut codenames: Vec<String> = Permission::all().map(|p| p.codename()).collect();
        let total = codenames.len();
        codenames.sort();
        codenames.dedup();
        assert_eq!(codenames.len(), total);
        assert_eq!(total, Resource::ALL.len() * Action::ALL.len());
    }

    #[test]
    fn deserializes_from_config_string() {
        #[derive(Deserialize)]
        struct Wrapper {
            perms: Vec<Permission>,
        }

        let ok: Wrapper = toml::from_str(r#"perms = ["blog.comment.add"]"#).unwrap();
        assert_eq!(ok.perms[0].codename(), "add_comment");

        let bad = toml::from_str::<Wrapper>(r#"perms = ["blog.comment.frobnicate"]"#);
        assert!(bad.is_err());
    }

    #[test]
    fn content_type_has_readable_name() {
        let p = Permission::new(Resource::ContentType, Action::View);
        assert_eq!(p.name(), "Can view content type");
        assert_eq!(Permission::from_codename("view_contenttype"), Some(p));
    }
}
