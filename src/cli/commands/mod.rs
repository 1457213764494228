mod groups;
mod users;

pub use groups::cmd_init_groups;
pub use users::{cmd_create_user, cmd_issue_code};
