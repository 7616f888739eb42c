pub mod prelude;

pub mod accounts;
pub mod auth_sessions;
pub mod blog_posts;
pub mod projects;
pub mod users;
