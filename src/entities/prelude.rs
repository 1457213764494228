pub use super::addresses::Entity as Addresses;
pub use super::auth_tokens::Entity as AuthTokens;
pub use super::categories::Entity as Categories;
pub use super::comments::Entity as Comments;
pub use super::group_permissions::Entity as GroupPermissions;
pub use super::groups::Entity as Groups;
pub use super::permissions::Entity as Permissions;
pub use super::post_bookmarks::Entity as PostBookmarks;
pub use super::post_tags::Entity as PostTags;
pub use super::posts::Entity as Posts;
pub use super::stars::Entity as Stars;
pub use super::tags::Entity as Tags;
pub use super::user_groups::Entity as UserGroups;
pub use super::user_permissions::Entity as UserPermissions;
pub use super::users::Entity as Users;
pub use super::verification_codes::Entity as VerificationCodes;
