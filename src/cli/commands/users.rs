use crate::config::Config;
use crate::domain::Role;
use crate::state::SharedState;

pub async fn cmd_users_promote(config: &Config, email: &str, role: &str) -> anyhow::Result<()> {
    let role = match role.trim().to_lowercase().as_str() {
        "admin" => Role::Admin,
        "user" => Role::User,
        other => {
            println!("Unknown role '{other}'. Use 'admin' or 'user'.");
            return Ok(());
        }
    };

    let shared = SharedState::new(config.clone()).await?;
    let Some(account) = shared.store.get_account_by_email(email).await? else {
        println!("No account registered for {email}.");
        return Ok(());
    };

    // Accounts that never signed in have no profile yet
    shared.roles.upsert_profile(&account.identity()).await?;
    shared.roles.set_role(&account.id, role).await?;

    println!("✓ {} is now {role}", account.email);
    Ok(())
}

pub async fn cmd_users_confirm(config: &Config, email: &str) -> anyhow::Result<()> {
    let shared = SharedState::new(config.clone()).await?;

    if shared.accounts.confirm_email(email).await? {
        println!("✓ Confirmed {email}");
    } else {
        println!("No account registered for {email}.");
    }

    Ok(())
}
