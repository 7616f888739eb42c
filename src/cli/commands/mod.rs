mod auth;
mod content;
mod context;
mod settings;
mod users;

pub use auth::{cmd_login, cmd_logout, cmd_reset_password, cmd_signup, cmd_whoami};
pub use content::{
    cmd_posts_add, cmd_posts_feature, cmd_posts_list, cmd_posts_publish, cmd_posts_remove,
    cmd_projects_add, cmd_projects_feature, cmd_projects_list, cmd_projects_publish,
    cmd_projects_remove,
};
pub use settings::{cmd_settings_reset, cmd_settings_set, cmd_settings_show};
pub use users::{cmd_users_confirm, cmd_users_promote};
