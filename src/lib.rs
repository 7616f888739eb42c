pub mod api;
pub mod cli;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, PostCommands, ProjectCommands, SettingsCommands, UserCommands};
pub use config::Config;
use domain::AuthSettingsPatch;
use models::{BlogPostDraft, ProjectDraft};
use state::SharedState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Logs go to stderr so command output on stdout stays clean
    if config.general.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    if matches!(command, Commands::Init) {
        if Config::create_default_if_missing()? {
            println!("✓ Config file created. Edit config.toml and run again.");
        } else {
            println!("config.toml already exists, leaving it untouched.");
        }
        return Ok(());
    }

    let config = Config::load()?;
    config.validate()?;
    init_tracing(&config);

    match command {
        Commands::Init => Ok(()),

        Commands::Serve => run_server(config).await,

        Commands::Signup {
            email,
            name,
            password,
        } => cli::cmd_signup(&config, &email, name.as_deref(), password).await,

        Commands::Login {
            email,
            password,
            remember,
        } => cli::cmd_login(&config, email.as_deref(), password, remember).await,

        Commands::Logout => cli::cmd_logout(&config).await,

        Commands::Whoami => cli::cmd_whoami(&config).await,

        Commands::ResetPassword { email } => cli::cmd_reset_password(&config, &email).await,

        Commands::Settings { command } => match command {
            SettingsCommands::Show => cli::cmd_settings_show(&config).await,
            SettingsCommands::Set {
                registration,
                email_verification,
                password_reset,
                social_login,
            } => {
                let patch = AuthSettingsPatch {
                    enable_registration: registration,
                    require_email_verification: email_verification,
                    enable_password_reset: password_reset,
                    enable_social_login: social_login,
                };
                cli::cmd_settings_set(&config, patch).await
            }
            SettingsCommands::Reset => cli::cmd_settings_reset(&config).await,
        },

        Commands::Projects { command } => match command {
            ProjectCommands::List => cli::cmd_projects_list(&config).await,
            ProjectCommands::Add {
                title,
                description,
                technologies,
                image,
                github,
                demo,
                featured,
                draft,
            } => {
                let draft = ProjectDraft {
                    id: String::new(),
                    title,
                    description,
                    technologies,
                    image,
                    github,
                    demo,
                    featured,
                    published: !draft,
                };
                cli::cmd_projects_add(&config, draft).await
            }
            ProjectCommands::Publish { id, off } => {
                cli::cmd_projects_publish(&config, &id, !off).await
            }
            ProjectCommands::Feature { id, off } => {
                cli::cmd_projects_feature(&config, &id, !off).await
            }
            ProjectCommands::Remove { id, yes } => cli::cmd_projects_remove(&config, &id, yes).await,
        },

        Commands::Posts { command } => match command {
            PostCommands::List => cli::cmd_posts_list(&config).await,
            PostCommands::Add {
                title,
                excerpt,
                content_file,
                author,
                tags,
                image,
                featured,
                draft,
            } => {
                let content = match content_file {
                    Some(path) => std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                    None => String::new(),
                };
                let draft = BlogPostDraft {
                    id: String::new(),
                    title,
                    excerpt,
                    content,
                    author,
                    tags,
                    image,
                    featured,
                    published: !draft,
                };
                cli::cmd_posts_add(&config, draft).await
            }
            PostCommands::Publish { id, off } => cli::cmd_posts_publish(&config, &id, !off).await,
            PostCommands::Feature { id, off } => cli::cmd_posts_feature(&config, &id, !off).await,
            PostCommands::Remove { id, yes } => cli::cmd_posts_remove(&config, &id, yes).await,
        },

        Commands::Users { command } => match command {
            UserCommands::Promote { email, role } => {
                cli::cmd_users_promote(&config, &email, &role).await
            }
            UserCommands::Confirm { email } => cli::cmd_users_confirm(&config, &email).await,
        },
    }
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    info!("Folio v{} starting API server...", env!("CARGO_PKG_VERSION"));

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    let port = config.server.port;
    let shared = Arc::new(SharedState::new(config).await?);
    let api_state = api::create_app_state(shared, prometheus_handle);
    let app = api::router(api_state).await;

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("🌐 Web Server running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }
}
