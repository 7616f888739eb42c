//! Account and session commands

use crate::config::Config;
use crate::services::{AuthError, AuthPhase};

use super::context::{CliContext, prompt};

pub async fn cmd_signup(
    config: &Config,
    email: &str,
    name: Option<&str>,
    password: Option<String>,
) -> anyhow::Result<()> {
    let ctx = CliContext::open(config).await?;
    let password = match password {
        Some(p) => p,
        None => prompt("Password")?,
    };

    match ctx.auth.sign_up(email, &password, name.unwrap_or_default()).await {
        Ok(result) if result.session.is_some() => {
            println!("✓ Account created and signed in as {}", result.identity.email);
            println!("  The session is not kept; run 'folio login --remember' to stay signed in.");
        }
        Ok(result) => {
            println!("✓ Account created for {}", result.identity.email);
            println!("  Check your inbox to confirm the address before signing in.");
        }
        Err(AuthError::Disabled(feature)) => {
            println!("{feature} is currently disabled.");
        }
        Err(e) => println!("Sign-up failed: {e}"),
    }

    Ok(())
}

pub async fn cmd_login(
    config: &Config,
    email: Option<&str>,
    password: Option<String>,
    remember: bool,
) -> anyhow::Result<()> {
    let ctx = CliContext::open(config).await?;

    let email = match email.map(str::to_string).or_else(|| ctx.auth.remembered_email()) {
        Some(email) => email,
        None => prompt("Email")?,
    };
    let password = match password {
        Some(p) => p,
        None => prompt(&format!("Password for {email}"))?,
    };

    match ctx.auth.sign_in(&email, &password, remember).await {
        Ok(session) => {
            let role = ctx.auth.snapshot().role.unwrap_or_default();
            println!("✓ Signed in as {} ({role})", session.identity.email);
            if !remember {
                println!("  Session not remembered; later commands will need --remember.");
            }
        }
        Err(e) => println!("Sign-in failed: {e}"),
    }

    Ok(())
}

pub async fn cmd_logout(config: &Config) -> anyhow::Result<()> {
    let ctx = CliContext::open(config).await?;

    if !ctx.auth.snapshot().is_authenticated() {
        println!("Not signed in.");
        return Ok(());
    }

    match ctx.auth.sign_out().await {
        Ok(()) => println!("✓ Signed out"),
        Err(e) => println!("Signed out locally, but the provider reported: {e}"),
    }

    Ok(())
}

pub async fn cmd_whoami(config: &Config) -> anyhow::Result<()> {
    let ctx = CliContext::open(config).await?;
    let snapshot = ctx.auth.snapshot();

    match (&snapshot.phase, &snapshot.user) {
        (AuthPhase::Authenticated(role), Some(user)) => {
            println!("{} ({role})", user.email);
            println!("  ID: {}", user.id);
            if let Some(name) = &user.metadata.full_name {
                println!("  Name: {name}");
            }
            if let Some(expires_at) = snapshot.session.as_ref().and_then(|s| s.expires_at) {
                println!("  Session expires: {}", expires_at.format("%Y-%m-%d %H:%M UTC"));
            }
        }
        _ => {
            println!("Not signed in.");
            if let Some(email) = ctx.auth.remembered_email() {
                println!("Remembered email: {email}");
            }
        }
    }

    Ok(())
}

pub async fn cmd_reset_password(config: &Config, email: &str) -> anyhow::Result<()> {
    let ctx = CliContext::open(config).await?;

    match ctx.auth.reset_password(email).await {
        Ok(()) => println!("✓ If {email} has an account, a reset link is on its way."),
        Err(AuthError::Disabled(feature)) => println!("{feature} is currently disabled."),
        Err(e) => println!("Password reset failed: {e}"),
    }

    Ok(())
}
