use std::io::Write;
use std::sync::Arc;

use crate::config::Config;
use crate::services::AuthContext;
use crate::state::SharedState;
use crate::storage::{FileStorage, LocalStorage};

/// Everything an interactive command needs: the store-backed services and
/// an auth context mounted over the durable local storage file.
pub struct CliContext {
    pub shared: SharedState,
    pub auth: AuthContext,
}

impl CliContext {
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let shared = SharedState::new(config.clone()).await?;
        let storage: Arc<dyn LocalStorage> =
            Arc::new(FileStorage::new(&config.general.storage_path));

        let auth = shared.auth_context(storage).await;
        auth.mount().await;

        Ok(Self { shared, auth })
    }

    /// Fails with a hint when nobody is signed in.
    pub fn require_session(&self) -> anyhow::Result<()> {
        if self.auth.snapshot().is_authenticated() {
            Ok(())
        } else {
            anyhow::bail!("Not signed in. Run: folio login <email> --remember")
        }
    }
}

pub fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

pub fn confirm(question: &str) -> anyhow::Result<bool> {
    println!("{question}");
    println!("Enter 'y' to confirm, anything else to cancel:");

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
