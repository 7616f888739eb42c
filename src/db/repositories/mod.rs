pub mod account;
pub mod blog_post;
pub mod profile;
pub mod project;
