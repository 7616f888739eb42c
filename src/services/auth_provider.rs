//! Contract expected from the identity/session provider.
//!
//! The rest of the system only relies on the shapes defined here; the
//! provider itself is a black box that may be local or remote.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::domain::events::AuthChangeEvent;
use crate::domain::{Identity, Session};

/// Errors returned by an identity provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// A structured error from the provider. The message is shown verbatim.
    #[error("{message}")]
    Api {
        message: String,
        code: Option<String>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    pub fn api(message: impl Into<String>, code: &str) -> Self {
        Self::Api {
            message: message.into(),
            code: Some(code.to_string()),
        }
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            Self::Internal(_) => None,
        }
    }
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignUpOptions {
    pub full_name: Option<String>,

    /// Where the confirmation link should land. When set, the account
    /// must confirm its email before it can sign in.
    pub email_redirect_to: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpResult {
    pub identity: Identity,

    /// `None` while the email is awaiting confirmation.
    pub session: Option<Session>,
}

/// A live registration for provider change events.
///
/// Events arrive in the order the provider emitted them. Dropping the
/// subscription unregisters it too.
pub struct AuthSubscription {
    receiver: broadcast::Receiver<AuthChangeEvent>,
}

impl AuthSubscription {
    #[must_use]
    pub const fn new(receiver: broadcast::Receiver<AuthChangeEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event. `None` once the provider is gone.
    ///
    /// A lagging subscriber skips what it missed and keeps going.
    pub async fn recv(&mut self) -> Option<AuthChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {
        drop(self.receiver);
    }
}

#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ProviderError::Api`] for bad credentials or an
    /// unconfirmed email.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, ProviderError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        options: SignUpOptions,
    ) -> Result<SignUpResult, ProviderError>;

    /// Ends `token`, or the provider's current session when `None`.
    async fn sign_out(&self, token: Option<&str>) -> Result<(), ProviderError>;

    async fn get_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Adopts a previously issued session after validating it.
    async fn set_session(&self, session: &Session) -> Result<Session, ProviderError>;

    /// Verifies a bearer token and returns its owner.
    async fn get_user(&self, token: &str) -> Result<Identity, ProviderError>;

    async fn refresh_session(&self) -> Result<Session, ProviderError>;

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ProviderError>;

    fn subscribe(&self) -> AuthSubscription;
}
