pub mod address;
pub mod category;
pub mod comment;
pub mod group;
pub mod permission;
pub mod post;
pub mod star;
pub mod tag;
pub mod token;
pub mod user;
pub mod verification;
