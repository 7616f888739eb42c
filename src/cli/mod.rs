//! CLI module - command-line admin dashboard for Folio
//!
//! Interactive commands share one durable local storage file, so a
//! remembered session or changed settings carry over between invocations.

mod commands;

use clap::{Parser, Subcommand};

/// Folio - portfolio content manager
#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    #[command(alias = "web", alias = "daemon")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Register a new account
    Signup {
        email: String,
        /// Display name stored on the profile
        #[arg(long)]
        name: Option<String>,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign in with email and password
    Login {
        /// Defaults to the remembered email
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// Keep the session for later commands
        #[arg(long, short)]
        remember: bool,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user and role
    Whoami,

    /// Send a password reset link
    ResetPassword { email: String },

    /// Manage auth feature flags
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Manage portfolio projects
    #[command(alias = "p")]
    Projects {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Manage blog posts
    #[command(alias = "blog")]
    Posts {
        #[command(subcommand)]
        command: PostCommands,
    },

    /// Manage user accounts and roles
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print current flags
    Show,
    /// Change one or more flags
    Set {
        #[arg(long)]
        registration: Option<bool>,
        #[arg(long)]
        email_verification: Option<bool>,
        #[arg(long)]
        password_reset: Option<bool>,
        #[arg(long)]
        social_login: Option<bool>,
    },
    /// Restore defaults
    Reset,
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List published projects
    #[command(alias = "ls")]
    List,
    /// Create a project
    Add {
        title: String,
        #[arg(long)]
        description: String,
        /// Repeat for each technology
        #[arg(long = "tech")]
        technologies: Vec<String>,
        #[arg(long, default_value = "")]
        image: String,
        #[arg(long)]
        github: Option<String>,
        #[arg(long)]
        demo: Option<String>,
        #[arg(long)]
        featured: bool,
        /// Save unpublished
        #[arg(long)]
        draft: bool,
    },
    /// Publish (or with --off, unpublish) a project
    Publish {
        id: String,
        #[arg(long)]
        off: bool,
    },
    /// Feature (or with --off, unfeature) a project
    Feature {
        id: String,
        #[arg(long)]
        off: bool,
    },
    /// Delete a project
    #[command(alias = "rm")]
    Remove {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum PostCommands {
    /// List published posts
    #[command(alias = "ls")]
    List,
    /// Create a post
    Add {
        title: String,
        #[arg(long, default_value = "")]
        excerpt: String,
        /// Post body; read from this file
        #[arg(long)]
        content_file: Option<std::path::PathBuf>,
        #[arg(long, default_value = "")]
        author: String,
        /// Repeat for each tag
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        featured: bool,
        #[arg(long)]
        draft: bool,
    },
    /// Publish (or with --off, unpublish) a post
    Publish {
        id: String,
        #[arg(long)]
        off: bool,
    },
    /// Feature (or with --off, unfeature) a post
    Feature {
        id: String,
        #[arg(long)]
        off: bool,
    },
    /// Delete a post
    #[command(alias = "rm")]
    Remove {
        id: String,
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Set a user's role
    Promote {
        email: String,
        /// `admin` or `user`
        #[arg(long, default_value = "admin")]
        role: String,
    },
    /// Mark an account's email as verified
    Confirm { email: String },
}

pub use commands::*;
