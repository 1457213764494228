pub mod prelude;

pub mod addresses;
pub mod auth_tokens;
pub mod categories;
pub mod comments;
pub mod group_permissions;
pub mod groups;
pub mod permissions;
pub mod post_bookmarks;
pub mod post_tags;
pub mod posts;
pub mod stars;
pub mod tags;
pub mod user_groups;
pub mod user_permissions;
pub mod users;
pub mod verification_codes;
