//! `SeaORM` implementation of the `AuthProvider` trait.
//!
//! A self-hosted identity provider: accounts and bearer sessions live in
//! the same relational store as the content.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::{RwLock, broadcast};
use tracing::{info, warn};

use crate::config::{AuthConfig, SecurityConfig};
use crate::constants::limits::AUTH_EVENT_BUFFER;
use crate::db::{Account, AuthSessionRow, NewAccount, Store, is_unique_violation};
use crate::domain::events::{AuthChangeEvent, AuthEventKind};
use crate::domain::{Identity, Session};
use crate::services::auth_provider::{
    AuthProvider, AuthSubscription, ProviderError, SignUpOptions, SignUpResult,
};

pub struct SeaOrmAuthProvider {
    store: Store,
    security: SecurityConfig,
    session_ttl: Duration,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthChangeEvent>,
}

impl SeaOrmAuthProvider {
    #[must_use]
    pub fn new(store: Store, auth: &AuthConfig, security: &SecurityConfig) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_BUFFER);
        Self {
            store,
            security: security.clone(),
            session_ttl: Duration::hours(i64::from(auth.session_ttl_hours)),
            current: RwLock::new(None),
            events,
        }
    }

    /// Marks the account's email as verified. Returns false for unknown emails.
    pub async fn confirm_email(&self, email: &str) -> Result<bool, ProviderError> {
        let confirmed = self.store.confirm_account_email(email).await?;
        if confirmed {
            info!(email, "Email confirmed");
        }
        Ok(confirmed)
    }

    /// Replaces the current session and emits `kind` while holding the
    /// lock, so event order always matches state order.
    async fn publish(&self, kind: AuthEventKind, session: Option<Session>) {
        let mut current = self.current.write().await;
        *current = session.clone();
        let _ = self.events.send(AuthChangeEvent::new(kind, session));
    }

    async fn start_session(&self, account: &Account) -> Result<Session, ProviderError> {
        let (token, expires_at) = self
            .store
            .create_auth_session(&account.id, self.session_ttl)
            .await?;

        Ok(Session {
            token,
            identity: account.identity(),
            expires_at: Some(expires_at),
        })
    }

    /// Looks up a stored token, deleting it when it has expired.
    async fn live_session(&self, token: &str) -> Result<AuthSessionRow, ProviderError> {
        let row = self
            .store
            .get_auth_session(token)
            .await?
            .ok_or_else(|| ProviderError::api("Invalid or unknown session token", "session_not_found"))?;

        if row.expires_at <= Utc::now() {
            if let Err(e) = self.store.delete_auth_session(token).await {
                warn!(error = %e, "Failed to delete expired auth session");
            }
            return Err(ProviderError::api("Session expired", "session_expired"));
        }

        Ok(row)
    }

    fn validate_sign_up(&self, email: &str, password: &str) -> Result<(), ProviderError> {
        let email = email.trim();
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid_email {
            return Err(ProviderError::api(
                "Unable to validate email address: invalid format",
                "validation_failed",
            ));
        }

        if password.chars().count() < self.security.min_password_length {
            return Err(ProviderError::api(
                format!(
                    "Password should be at least {} characters",
                    self.security.min_password_length
                ),
                "weak_password",
            ));
        }

        Ok(())
    }
}

fn already_registered() -> ProviderError {
    ProviderError::api("User already registered", "user_already_exists")
}

#[async_trait]
impl AuthProvider for SeaOrmAuthProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, ProviderError> {
        let account = self
            .store
            .verify_account_password(email, password)
            .await?
            .ok_or_else(|| ProviderError::api("Invalid login credentials", "invalid_credentials"))?;

        if !account.email_confirmed {
            return Err(ProviderError::api("Email not confirmed", "email_not_confirmed"));
        }

        let session = self.start_session(&account).await?;
        info!(user_id = %account.id, "User signed in");

        self.publish(AuthEventKind::SignedIn, Some(session.clone()))
            .await;
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        options: SignUpOptions,
    ) -> Result<SignUpResult, ProviderError> {
        self.validate_sign_up(email, password)?;

        if self.store.get_account_by_email(email).await?.is_some() {
            return Err(already_registered());
        }

        let requires_confirmation = options.email_redirect_to.is_some();
        let new = NewAccount {
            email,
            password,
            full_name: options.full_name.as_deref(),
            email_confirmed: !requires_confirmation,
        };

        let account = match self.store.create_account(new, &self.security).await {
            Ok(account) => account,
            // Lost a race with a concurrent sign-up for the same email
            Err(e) if is_unique_violation(&e) => return Err(already_registered()),
            Err(e) => return Err(e.into()),
        };

        if let Some(redirect_to) = options.email_redirect_to {
            info!(
                user_id = %account.id,
                email = %account.email,
                redirect_to = %redirect_to,
                "Account created, awaiting email confirmation"
            );
            return Ok(SignUpResult {
                identity: account.identity(),
                session: None,
            });
        }

        let session = self.start_session(&account).await?;
        info!(user_id = %account.id, "Account created and signed in");

        self.publish(AuthEventKind::SignedIn, Some(session.clone()))
            .await;
        Ok(SignUpResult {
            identity: account.identity(),
            session: Some(session),
        })
    }

    async fn sign_out(&self, token: Option<&str>) -> Result<(), ProviderError> {
        let current_token = self.current.read().await.as_ref().map(|s| s.token.clone());
        let token = token.map(str::to_string).or(current_token.clone());

        if let Some(token) = &token {
            self.store.delete_auth_session(token).await?;
        }

        // Signing out some other bearer leaves our own session alone
        if token.is_none() || token == current_token {
            self.publish(AuthEventKind::SignedOut, None).await;
        }

        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        let Some(session) = self.current.read().await.clone() else {
            return Ok(None);
        };

        if session.is_expired_at(Utc::now()) {
            if let Err(e) = self.store.delete_auth_session(&session.token).await {
                warn!(error = %e, "Failed to delete expired auth session");
            }
            self.publish(AuthEventKind::SignedOut, None).await;
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn set_session(&self, session: &Session) -> Result<Session, ProviderError> {
        let row = self.live_session(&session.token).await?;

        let adopted = Session {
            token: row.token,
            identity: row.account.identity(),
            expires_at: Some(row.expires_at),
        };

        self.publish(AuthEventKind::SignedIn, Some(adopted.clone()))
            .await;
        Ok(adopted)
    }

    async fn get_user(&self, token: &str) -> Result<Identity, ProviderError> {
        let row = self.live_session(token).await?;
        Ok(row.account.identity())
    }

    async fn refresh_session(&self) -> Result<Session, ProviderError> {
        let current = self
            .current
            .read()
            .await
            .clone()
            .ok_or_else(|| ProviderError::api("Auth session missing!", "session_missing"))?;

        let row = self.live_session(&current.token).await?;
        let refreshed = self.start_session(&row.account).await?;
        self.store.delete_auth_session(&current.token).await?;

        self.publish(AuthEventKind::TokenRefreshed, Some(refreshed.clone()))
            .await;
        Ok(refreshed)
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ProviderError> {
        // Unknown emails succeed too, so callers cannot enumerate accounts
        if self.store.mark_recovery_sent(email).await? {
            info!(email, redirect_to, "Password recovery requested");
        }
        Ok(())
    }

    fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.events.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_security() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            min_password_length: 6,
        }
    }

    async fn provider() -> SeaOrmAuthProvider {
        let store = Store::new("sqlite::memory:").await.unwrap();
        SeaOrmAuthProvider::new(store, &AuthConfig::default(), &fast_security())
    }

    #[tokio::test]
    async fn sign_up_then_sign_in_emits_events_in_order() {
        let provider = provider().await;
        let mut events = provider.subscribe();

        let result = provider
            .sign_up("a@x.com", "secret1", SignUpOptions::default())
            .await
            .unwrap();
        assert!(result.session.is_some());

        let session = provider
            .sign_in_with_password("A@X.com", "secret1")
            .await
            .unwrap();
        assert_eq!(session.identity.email, "a@x.com");

        provider.sign_out(None).await.unwrap();

        let kinds: Vec<_> = [
            events.recv().await.unwrap().kind,
            events.recv().await.unwrap().kind,
            events.recv().await.unwrap().kind,
        ]
        .into();
        assert_eq!(
            kinds,
            vec![
                AuthEventKind::SignedIn,
                AuthEventKind::SignedIn,
                AuthEventKind::SignedOut
            ]
        );
        assert!(provider.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let provider = provider().await;
        provider
            .sign_up("a@x.com", "secret1", SignUpOptions::default())
            .await
            .unwrap();

        let err = provider
            .sign_in_with_password("a@x.com", "nope-nope")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[tokio::test]
    async fn duplicate_sign_up_is_rejected() {
        let provider = provider().await;
        provider
            .sign_up("a@x.com", "secret1", SignUpOptions::default())
            .await
            .unwrap();

        let err = provider
            .sign_up("a@x.com", "secret2", SignUpOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("user_already_exists"));
    }

    #[tokio::test]
    async fn verification_blocks_sign_in_until_confirmed() {
        let provider = provider().await;
        let result = provider
            .sign_up(
                "a@x.com",
                "secret1",
                SignUpOptions {
                    full_name: Some("Ada".to_string()),
                    email_redirect_to: Some("http://localhost:3000/auth/callback".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(result.session.is_none());
        assert_eq!(result.identity.metadata.full_name.as_deref(), Some("Ada"));

        let err = provider
            .sign_in_with_password("a@x.com", "secret1")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email not confirmed");

        assert!(provider.confirm_email("a@x.com").await.unwrap());
        provider
            .sign_in_with_password("a@x.com", "secret1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let provider = provider().await;
        let err = provider
            .sign_up("a@x.com", "123", SignUpOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("weak_password"));
    }

    #[tokio::test]
    async fn get_user_verifies_tokens() {
        let provider = provider().await;
        let session = provider
            .sign_up("a@x.com", "secret1", SignUpOptions::default())
            .await
            .unwrap()
            .session
            .unwrap();

        let identity = provider.get_user(&session.token).await.unwrap();
        assert_eq!(identity.id, session.identity.id);

        assert!(provider.get_user("bogus").await.is_err());
    }

    #[tokio::test]
    async fn refresh_rotates_the_token() {
        let provider = provider().await;
        let session = provider
            .sign_up("a@x.com", "secret1", SignUpOptions::default())
            .await
            .unwrap()
            .session
            .unwrap();

        let refreshed = provider.refresh_session().await.unwrap();
        assert_ne!(refreshed.token, session.token);
        assert!(provider.get_user(&session.token).await.is_err());
        assert!(provider.get_user(&refreshed.token).await.is_ok());
    }

    #[tokio::test]
    async fn set_session_rejects_revoked_tokens() {
        let provider = provider().await;
        let session = provider
            .sign_up("a@x.com", "secret1", SignUpOptions::default())
            .await
            .unwrap()
            .session
            .unwrap();

        provider.sign_out(Some(&session.token)).await.unwrap();
        assert!(provider.set_session(&session).await.is_err());
    }

    #[tokio::test]
    async fn reset_for_unknown_email_succeeds() {
        let provider = provider().await;
        provider
            .reset_password_for_email("ghost@x.com", "http://localhost:3000/admin")
            .await
            .unwrap();
    }
}
