use crate::config::Config;
use crate::domain::{AuthSettings, AuthSettingsPatch};

use super::context::CliContext;

fn print_settings(settings: &AuthSettings) {
    let mark = |on: bool| if on { "on" } else { "off" };
    println!("Registration:        {}", mark(settings.enable_registration));
    println!("Email verification:  {}", mark(settings.require_email_verification));
    println!("Password reset:      {}", mark(settings.enable_password_reset));
    println!("Social login:        {}", mark(settings.enable_social_login));
}

pub async fn cmd_settings_show(config: &Config) -> anyhow::Result<()> {
    let ctx = CliContext::open(config).await?;
    print_settings(&ctx.auth.settings().current());
    Ok(())
}

pub async fn cmd_settings_set(config: &Config, patch: AuthSettingsPatch) -> anyhow::Result<()> {
    if patch.is_empty() {
        println!("Nothing to change. See: folio settings set --help");
        return Ok(());
    }

    let ctx = CliContext::open(config).await?;
    let settings = ctx.auth.settings().update(&patch);
    println!("✓ Settings updated");
    print_settings(&settings);
    Ok(())
}

pub async fn cmd_settings_reset(config: &Config) -> anyhow::Result<()> {
    let ctx = CliContext::open(config).await?;
    let settings = ctx.auth.settings().reset();
    println!("✓ Settings restored to defaults");
    print_settings(&settings);
    Ok(())
}
