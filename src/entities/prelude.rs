pub use super::accounts::Entity as Accounts;
pub use super::auth_sessions::Entity as AuthSessions;
pub use super::blog_posts::Entity as BlogPosts;
pub use super::projects::Entity as Projects;
pub use super::users::Entity as Users;
