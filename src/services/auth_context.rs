//! Observable authentication state.
//!
//! [`AuthContext`] composes the provider, the role resolver and the two
//! local stores into one state value ([`AuthSnapshot`]) published through a
//! `watch` channel. Public operations never panic or leak provider
//! internals: every failure comes back as an [`AuthError`].
//!
//! Provider change events are consumed by a single listener task, so they
//! are applied strictly in delivery order. After [`AuthContext::dispose`]
//! nothing is written to the snapshot or to durable storage, even by
//! operations that were already waiting on the provider. Likewise, work
//! that started before a sign-out never brings the old session back.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::events::{AuthChangeEvent, AuthEventKind};
use crate::domain::{AuthSettings, Identity, Role, Session};
use crate::services::auth_provider::{
    AuthProvider, AuthSubscription, ProviderError, SignUpOptions, SignUpResult,
};
use crate::services::redirect::Redirects;
use crate::services::role_service::RoleService;
use crate::services::session_store::SessionStore;
use crate::services::settings::SettingsStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Feature {
    Registration,
    PasswordReset,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration => f.write_str("Registration"),
            Self::PasswordReset => f.write_str("Password reset"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// A feature flag is off. The provider was not contacted.
    #[error("{0} is currently disabled")]
    Disabled(Feature),

    #[error("{0}")]
    Provider(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Api { message, .. } => Self::Provider(message),
            ProviderError::Internal(message) => Self::Unknown(message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthPhase {
    Uninitialized,
    Loading,
    Authenticated(Role),
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    pub phase: AuthPhase,
    pub user: Option<Identity>,
    pub session: Option<Session>,
    pub role: Option<Role>,
    pub loading: bool,
}

impl AuthSnapshot {
    fn uninitialized() -> Self {
        Self {
            phase: AuthPhase::Uninitialized,
            user: None,
            session: None,
            role: None,
            loading: true,
        }
    }

    fn loading() -> Self {
        Self {
            phase: AuthPhase::Loading,
            ..Self::uninitialized()
        }
    }

    fn authenticated(session: Session, role: Role) -> Self {
        Self {
            phase: AuthPhase::Authenticated(role),
            user: Some(session.identity.clone()),
            session: Some(session),
            role: Some(role),
            loading: false,
        }
    }

    fn unauthenticated() -> Self {
        Self {
            phase: AuthPhase::Unauthenticated,
            user: None,
            session: None,
            role: None,
            loading: false,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_some_and(|r| r.is_admin())
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}

/// What a successful sign-in does to durable storage.
#[derive(Debug, Clone, Copy)]
enum Persistence {
    /// Persist the session and remember the email.
    Remember,
    /// Keep the session in memory only and forget any remembered email.
    MemoryOnly,
    Unchanged,
}

/// Write gate shared by every state and storage update.
///
/// `epoch` moves on each sign-out, so work that started before it can tell
/// its result is stale. `ended` holds tokens this context has signed out.
#[derive(Default)]
struct Gate {
    disposed: bool,
    epoch: u64,
    ended: HashSet<String>,
}

struct Shared {
    provider: Arc<dyn AuthProvider>,
    roles: Arc<dyn RoleService>,
    settings: Arc<SettingsStore>,
    sessions: Arc<SessionStore>,
    state: watch::Sender<AuthSnapshot>,
    gate: Mutex<Gate>,
}

impl Shared {
    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn epoch(&self) -> u64 {
        self.gate().epoch
    }

    /// Runs `apply` unless the context has been disposed. The lock is held
    /// for the whole write so `dispose` cannot interleave with it.
    fn commit(&self, apply: impl FnOnce(&Self)) -> bool {
        let gate = self.gate();
        if gate.disposed {
            debug!("Auth context disposed, dropping state update");
            return false;
        }
        apply(self);
        true
    }

    /// Like [`Self::commit`], but also drops the write when a sign-out
    /// happened after `epoch` was read.
    fn commit_at(&self, epoch: u64, apply: impl FnOnce(&Self)) -> bool {
        let gate = self.gate();
        if gate.disposed {
            debug!("Auth context disposed, dropping state update");
            return false;
        }
        if gate.epoch != epoch {
            debug!("Signed out meanwhile, dropping stale state update");
            return false;
        }
        apply(self);
        true
    }

    /// Current epoch, or `None` when `token` was already signed out here.
    fn admit(&self, token: &str) -> Option<u64> {
        let gate = self.gate();
        (!gate.ended.contains(token)).then_some(gate.epoch)
    }

    /// Clears the session and advances the epoch in one step.
    fn end_session(&self, forget_email: bool) -> bool {
        let mut gate = self.gate();
        if gate.disposed {
            debug!("Auth context disposed, dropping state update");
            return false;
        }

        gate.epoch += 1;
        let token = self.state.borrow().session.as_ref().map(|s| s.token.clone());
        if let Some(token) = token {
            gate.ended.insert(token);
        }

        if forget_email {
            self.sessions.clear();
        } else {
            self.sessions.set_current(None);
            self.sessions.forget_persisted();
        }
        self.publish(AuthSnapshot::unauthenticated());
        true
    }

    fn publish(&self, snapshot: AuthSnapshot) {
        self.state.send_replace(snapshot);
    }

    /// Upserts the profile, resolves the role and publishes the session,
    /// unless a sign-out happened since `epoch`.
    async fn establish(&self, session: Session, persistence: Persistence, epoch: u64) {
        if let Err(e) = self.roles.upsert_profile(&session.identity).await {
            warn!(user_id = %session.user_id(), error = %e, "Profile upsert failed");
        }
        let role = self.roles.resolve_role(session.user_id()).await;

        self.commit_at(epoch, |s| {
            match persistence {
                Persistence::Remember => {
                    s.sessions.persist(&session);
                    s.sessions.remember_email(&session.identity.email);
                }
                Persistence::MemoryOnly => {
                    s.sessions.forget_persisted();
                    s.sessions.forget_email();
                }
                Persistence::Unchanged => {}
            }
            s.sessions.set_current(Some(session.clone()));
            s.publish(AuthSnapshot::authenticated(session, role));
        });
    }

    async fn handle_event(&self, event: AuthChangeEvent) {
        metrics::counter!("auth_events_total", "event" => event.kind.as_str()).increment(1);
        debug!(event = event.kind.as_str(), "Auth event received");

        match (event.kind, event.session) {
            (AuthEventKind::SignedIn, Some(session)) => {
                let current = self.state.borrow().session.clone();
                // Already applied by the operation that triggered it
                if current.is_some_and(|c| c.token == session.token) {
                    return;
                }
                let Some(epoch) = self.admit(&session.token) else {
                    debug!("Sign-in event for a signed-out session, ignoring");
                    return;
                };
                self.establish(session, Persistence::Unchanged, epoch).await;
            }
            (AuthEventKind::TokenRefreshed | AuthEventKind::UserUpdated, Some(session)) => {
                let epoch = self.epoch();
                let (current, known) = {
                    let state = self.state.borrow();
                    (state.session.clone(), state.role)
                };
                // Refreshes only extend a session this context still holds
                let Some(current) = current else {
                    debug!(event = event.kind.as_str(), "No active session, ignoring");
                    return;
                };
                if current.user_id() != session.user_id() {
                    warn!(event = event.kind.as_str(), "Event for another user, ignoring");
                    return;
                }

                let role = match known {
                    Some(role) => role,
                    None => self.roles.resolve_role(session.user_id()).await,
                };

                self.commit_at(epoch, |s| {
                    if s.sessions.is_persisted() {
                        s.sessions.persist(&session);
                    }
                    s.sessions.set_current(Some(session.clone()));
                    s.publish(AuthSnapshot::authenticated(session, role));
                });
            }
            (AuthEventKind::SignedOut, _) => {
                // A later sign-in already replaced the session this was about
                if let Ok(Some(live)) = self.provider.get_session().await {
                    debug!(user_id = %live.user_id(), "Provider still signed in, ignoring sign-out");
                    return;
                }
                self.end_session(false);
            }
            (AuthEventKind::PasswordRecovery, _) => {
                info!("Password recovery session started");
            }
            (kind, None) => {
                warn!(event = kind.as_str(), "Auth event without a session, ignoring");
            }
        }
    }
}

struct Listener {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

async fn listen(
    shared: Arc<Shared>,
    mut subscription: AuthSubscription,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            event = subscription.recv() => match event {
                Some(event) => shared.handle_event(event).await,
                None => break,
            },
        }
    }

    subscription.unsubscribe();
    debug!("Auth event listener stopped");
}

pub struct AuthContext {
    shared: Arc<Shared>,
    redirects: Redirects,
    hostname: String,
    listener: Mutex<Option<Listener>>,
}

impl AuthContext {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        roles: Arc<dyn RoleService>,
        settings: Arc<SettingsStore>,
        sessions: Arc<SessionStore>,
        redirects: Redirects,
        hostname: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::uninitialized());
        Self {
            shared: Arc::new(Shared {
                provider,
                roles,
                settings,
                sessions,
                state,
                gate: Mutex::new(Gate::default()),
            }),
            redirects,
            hostname: hostname.into(),
            listener: Mutex::new(None),
        }
    }

    /// Restores any existing session, then starts listening for provider
    /// events. Calling it again is a no-op.
    pub async fn mount(&self) {
        if self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
        {
            return;
        }

        let shared = &self.shared;
        shared.commit(|s| s.publish(AuthSnapshot::loading()));

        let persisted = shared.sessions.load_persisted();
        let current = match shared.provider.get_session().await {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "Failed to fetch current session");
                None
            }
        };

        let restored = match (current, &persisted) {
            (Some(session), _) => Some(session),
            (None, Some(saved)) => match shared.provider.set_session(saved).await {
                Ok(session) => Some(session),
                Err(e) => {
                    info!(error = %e, "Persisted session is no longer valid, discarding it");
                    shared.commit(|s| s.sessions.forget_persisted());
                    None
                }
            },
            (None, None) => None,
        };

        match restored {
            Some(session) => {
                let role = shared.roles.resolve_role(session.user_id()).await;
                info!(user_id = %session.user_id(), %role, "Session restored");
                shared.commit(|s| {
                    if persisted.is_some() {
                        s.sessions.persist(&session);
                    }
                    s.sessions.set_current(Some(session.clone()));
                    s.publish(AuthSnapshot::authenticated(session, role));
                });
            }
            None => {
                shared.commit(|s| {
                    s.sessions.set_current(None);
                    s.publish(AuthSnapshot::unauthenticated());
                });
            }
        }

        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        let disposed = shared.gate().disposed;
        if listener.is_none() && !disposed {
            let (shutdown, shutdown_rx) = oneshot::channel();
            let handle = tokio::spawn(listen(
                shared.clone(),
                shared.provider.subscribe(),
                shutdown_rx,
            ));
            *listener = Some(Listener { handle, shutdown });
        }
    }

    /// Stops the listener and blocks every later state or storage write.
    pub fn dispose(&self) {
        self.shared.gate().disposed = true;

        if let Some(listener) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = listener.shutdown.send(());
            drop(listener.handle);
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.gate().disposed
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.shared.state.borrow().clone()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthSnapshot> {
        self.shared.state.subscribe()
    }

    #[must_use]
    pub fn settings(&self) -> &SettingsStore {
        &self.shared.settings
    }

    /// Email saved by the last remembered sign-in, for pre-filling forms.
    #[must_use]
    pub fn remembered_email(&self) -> Option<String> {
        self.shared.sessions.remembered_email()
    }

    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<Session, AuthError> {
        let session = self
            .shared
            .provider
            .sign_in_with_password(email, password)
            .await
            .inspect_err(|e| debug!(error = %e, "Sign-in rejected"))?;
        let epoch = self.shared.epoch();

        let persistence = if remember_me {
            Persistence::Remember
        } else {
            Persistence::MemoryOnly
        };
        self.shared
            .establish(session.clone(), persistence, epoch)
            .await;

        Ok(session)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<SignUpResult, AuthError> {
        let settings = self.shared.settings.current();
        if !settings.enable_registration {
            return Err(AuthError::Disabled(Feature::Registration));
        }

        let full_name = full_name.trim();
        let options = SignUpOptions {
            full_name: (!full_name.is_empty()).then(|| full_name.to_string()),
            email_redirect_to: settings
                .require_email_verification
                .then(|| self.redirects.email_callback_url(&self.hostname)),
        };

        let result = self.shared.provider.sign_up(email, password, options).await?;

        if let Some(session) = &result.session {
            let epoch = self.shared.epoch();
            self.shared
                .establish(session.clone(), Persistence::Unchanged, epoch)
                .await;
        }

        Ok(result)
    }

    /// Clears local state first, then tells the provider. Updates still in
    /// flight for the old session are dropped.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self.snapshot().session.map(|s| s.token);

        self.shared.end_session(true);

        self.shared.provider.sign_out(token.as_deref()).await?;
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        if !self.shared.settings.current().enable_password_reset {
            return Err(AuthError::Disabled(Feature::PasswordReset));
        }

        let redirect_to = self.redirects.admin_redirect_url(&self.hostname);
        self.shared
            .provider
            .reset_password_for_email(email, &redirect_to)
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn auth_settings(&self) -> AuthSettings {
        self.shared.settings.current()
    }
}

impl Drop for AuthContext {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::domain::{AuthSettingsPatch, IdentityMetadata, ProfilePatch, UserProfile};
    use crate::services::role_service::ProfileError;
    use crate::storage::{LocalStorage, MemoryStorage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast;

    fn session(id: &str, token: &str) -> Session {
        Session {
            token: token.to_string(),
            identity: Identity {
                id: id.to_string(),
                email: format!("{id}@x.com"),
                metadata: IdentityMetadata::default(),
            },
            expires_at: None,
        }
    }

    /// Provider double that counts calls and lets tests inject events.
    struct StubProvider {
        calls: AtomicUsize,
        events: broadcast::Sender<AuthChangeEvent>,
        fail_sign_in: bool,
        /// Broadcast `SignedIn` before returning, like a real provider.
        announce_sign_in: bool,
    }

    impl StubProvider {
        fn new() -> Self {
            let (events, _) = broadcast::channel(16);
            Self {
                calls: AtomicUsize::new(0),
                events,
                fail_sign_in: false,
                announce_sign_in: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl AuthProvider for StubProvider {
        async fn sign_in_with_password(
            &self,
            email: &str,
            _password: &str,
        ) -> Result<Session, ProviderError> {
            self.hit();
            if self.fail_sign_in {
                return Err(ProviderError::api("Invalid login credentials", "invalid_credentials"));
            }
            let id = email.split('@').next().unwrap_or_default();
            let signed_in = session(id, "tok-1");
            if self.announce_sign_in {
                let _ = self.events.send(AuthChangeEvent::new(
                    AuthEventKind::SignedIn,
                    Some(signed_in.clone()),
                ));
            }
            Ok(signed_in)
        }

        async fn sign_up(
            &self,
            email: &str,
            _password: &str,
            options: SignUpOptions,
        ) -> Result<SignUpResult, ProviderError> {
            self.hit();
            Ok(SignUpResult {
                identity: Identity {
                    id: "new".to_string(),
                    email: email.to_string(),
                    metadata: IdentityMetadata {
                        full_name: options.full_name,
                        avatar_url: None,
                    },
                },
                session: None,
            })
        }

        async fn sign_out(&self, _token: Option<&str>) -> Result<(), ProviderError> {
            self.hit();
            Ok(())
        }

        async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
            self.hit();
            Ok(None)
        }

        async fn set_session(&self, session: &Session) -> Result<Session, ProviderError> {
            self.hit();
            if session.token == "revoked" {
                return Err(ProviderError::api("Session expired", "session_expired"));
            }
            Ok(session.clone())
        }

        async fn get_user(&self, _token: &str) -> Result<Identity, ProviderError> {
            self.hit();
            Err(ProviderError::Internal("unused".to_string()))
        }

        async fn refresh_session(&self) -> Result<Session, ProviderError> {
            self.hit();
            Err(ProviderError::Internal("unused".to_string()))
        }

        async fn reset_password_for_email(
            &self,
            _email: &str,
            _redirect_to: &str,
        ) -> Result<(), ProviderError> {
            self.hit();
            Ok(())
        }

        fn subscribe(&self) -> AuthSubscription {
            AuthSubscription::new(self.events.subscribe())
        }
    }

    struct FixedRoles(Role);

    #[async_trait::async_trait]
    impl RoleService for FixedRoles {
        async fn resolve_role(&self, _user_id: &str) -> Role {
            self.0
        }

        async fn upsert_profile(&self, _identity: &Identity) -> Result<(), ProfileError> {
            Ok(())
        }

        async fn get_profile(&self, _user_id: &str) -> Result<Option<UserProfile>, ProfileError> {
            Ok(None)
        }

        async fn set_role(&self, user_id: &str, _role: Role) -> Result<(), ProfileError> {
            Err(ProfileError::NotFound(user_id.to_string()))
        }

        async fn update_profile(
            &self,
            user_id: &str,
            _patch: &ProfilePatch,
        ) -> Result<UserProfile, ProfileError> {
            Err(ProfileError::NotFound(user_id.to_string()))
        }
    }

    /// Role service whose profile upsert takes a while, so event handling
    /// is still mid-flight when the caller moves on.
    struct SlowRoles;

    #[async_trait::async_trait]
    impl RoleService for SlowRoles {
        async fn resolve_role(&self, _user_id: &str) -> Role {
            tokio::task::yield_now().await;
            Role::User
        }

        async fn upsert_profile(&self, _identity: &Identity) -> Result<(), ProfileError> {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(())
        }

        async fn get_profile(&self, _user_id: &str) -> Result<Option<UserProfile>, ProfileError> {
            Ok(None)
        }

        async fn set_role(&self, user_id: &str, _role: Role) -> Result<(), ProfileError> {
            Err(ProfileError::NotFound(user_id.to_string()))
        }

        async fn update_profile(
            &self,
            user_id: &str,
            _patch: &ProfilePatch,
        ) -> Result<UserProfile, ProfileError> {
            Err(ProfileError::NotFound(user_id.to_string()))
        }
    }

    struct Harness {
        provider: Arc<StubProvider>,
        storage: Arc<dyn LocalStorage>,
        context: AuthContext,
    }

    fn harness_with(provider: StubProvider, storage: Arc<dyn LocalStorage>) -> Harness {
        let provider = Arc::new(provider);
        let context = AuthContext::new(
            provider.clone(),
            Arc::new(FixedRoles(Role::Admin)),
            Arc::new(SettingsStore::new(storage.clone())),
            Arc::new(SessionStore::new(storage.clone())),
            Redirects::new(&AuthConfig::default()),
            "localhost",
        );
        Harness {
            provider,
            storage,
            context,
        }
    }

    fn harness() -> Harness {
        harness_with(StubProvider::new(), Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn disabled_flags_short_circuit_without_provider_calls() {
        for registration in [true, false] {
            for reset in [true, false] {
                let h = harness();
                h.context.settings().update(&AuthSettingsPatch {
                    enable_registration: Some(registration),
                    enable_password_reset: Some(reset),
                    ..Default::default()
                });

                let sign_up = h.context.sign_up("a@x.com", "secret1", "Ada").await;
                let after_sign_up = h.provider.calls();
                let reset_result = h.context.reset_password("a@x.com").await;
                let after_reset = h.provider.calls();

                if registration {
                    assert!(sign_up.is_ok());
                    assert_eq!(after_sign_up, 1);
                } else {
                    assert_eq!(sign_up.unwrap_err(), AuthError::Disabled(Feature::Registration));
                    assert_eq!(after_sign_up, 0);
                }

                if reset {
                    assert!(reset_result.is_ok());
                    assert_eq!(after_reset, after_sign_up + 1);
                } else {
                    assert_eq!(
                        reset_result.unwrap_err(),
                        AuthError::Disabled(Feature::PasswordReset)
                    );
                    assert_eq!(after_reset, after_sign_up);
                }
            }
        }
    }

    #[tokio::test]
    async fn mount_without_session_is_unauthenticated() {
        let h = harness();
        assert_eq!(h.context.snapshot().phase, AuthPhase::Uninitialized);

        h.context.mount().await;
        let snapshot = h.context.snapshot();
        assert_eq!(snapshot.phase, AuthPhase::Unauthenticated);
        assert!(!snapshot.loading);
        assert!(!snapshot.is_authenticated());
    }

    #[tokio::test]
    async fn sign_in_with_remember_persists_session_and_email() {
        let h = harness();
        h.context.mount().await;

        h.context.sign_in("u1@x.com", "pw", true).await.unwrap();
        let snapshot = h.context.snapshot();
        assert_eq!(snapshot.phase, AuthPhase::Authenticated(Role::Admin));
        assert!(snapshot.is_authenticated());

        let sessions = SessionStore::new(h.storage.clone());
        assert_eq!(sessions.load_persisted().unwrap().token, "tok-1");
        assert_eq!(h.context.remembered_email().as_deref(), Some("u1@x.com"));
    }

    #[tokio::test]
    async fn sign_in_without_remember_writes_nothing_durable() {
        let h = harness();
        let sessions = SessionStore::new(h.storage.clone());
        sessions.remember_email("old@x.com");

        h.context.sign_in("u1@x.com", "pw", false).await.unwrap();
        assert!(h.context.snapshot().is_authenticated());
        assert!(sessions.load_persisted().is_none());
        assert!(sessions.remembered_email().is_none());
    }

    #[tokio::test]
    async fn sign_out_clears_everything() {
        let h = harness();
        h.context.mount().await;
        h.context.sign_in("u1@x.com", "pw", true).await.unwrap();

        h.context.sign_out().await.unwrap();

        let snapshot = h.context.snapshot();
        assert!(!snapshot.is_authenticated());
        assert_eq!(snapshot.role, None);
        assert_eq!(snapshot.phase, AuthPhase::Unauthenticated);

        let sessions = SessionStore::new(h.storage.clone());
        assert!(sessions.load_persisted().is_none());
        assert!(sessions.remembered_email().is_none());
    }

    #[tokio::test]
    async fn sign_out_sticks_while_sign_in_event_is_in_flight() {
        let mut provider = StubProvider::new();
        provider.announce_sign_in = true;
        let provider = Arc::new(provider);
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        let context = AuthContext::new(
            provider,
            Arc::new(SlowRoles),
            Arc::new(SettingsStore::new(storage.clone())),
            Arc::new(SessionStore::new(storage.clone())),
            Redirects::new(&AuthConfig::default()),
            "localhost",
        );
        context.mount().await;

        context.sign_in("u1@x.com", "pw", true).await.unwrap();
        context.sign_out().await.unwrap();
        assert!(!context.snapshot().is_authenticated());

        // Let the listener finish the SignedIn it picked up during sign-in
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let snapshot = context.snapshot();
        assert_eq!(snapshot.phase, AuthPhase::Unauthenticated);
        assert!(snapshot.session.is_none());
        assert!(SessionStore::new(storage).load_persisted().is_none());
    }

    #[tokio::test]
    async fn refresh_after_sign_out_is_ignored() {
        let h = harness();
        h.context.mount().await;
        h.context.sign_in("u1@x.com", "pw", true).await.unwrap();
        h.context.sign_out().await.unwrap();

        h.provider
            .events
            .send(AuthChangeEvent::new(
                AuthEventKind::TokenRefreshed,
                Some(session("u1", "tok-2")),
            ))
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(h.context.snapshot().phase, AuthPhase::Unauthenticated);
        assert!(SessionStore::new(h.storage.clone()).load_persisted().is_none());
    }

    #[tokio::test]
    async fn provider_errors_pass_through_verbatim() {
        let mut provider = StubProvider::new();
        provider.fail_sign_in = true;
        let h = harness_with(provider, Arc::new(MemoryStorage::new()));

        let err = h.context.sign_in("u1@x.com", "pw", true).await.unwrap_err();
        assert_eq!(err, AuthError::Provider("Invalid login credentials".to_string()));
        assert!(!h.context.snapshot().is_authenticated());
    }

    #[tokio::test]
    async fn mount_restores_persisted_session() {
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        SessionStore::new(storage.clone()).persist(&session("u1", "tok-saved"));

        let h = harness_with(StubProvider::new(), storage);
        h.context.mount().await;

        let snapshot = h.context.snapshot();
        assert_eq!(snapshot.phase, AuthPhase::Authenticated(Role::Admin));
        assert_eq!(snapshot.session.unwrap().token, "tok-saved");
    }

    #[tokio::test]
    async fn mount_discards_invalid_persisted_session() {
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        SessionStore::new(storage.clone()).persist(&session("u1", "revoked"));

        let h = harness_with(StubProvider::new(), storage.clone());
        h.context.mount().await;

        assert!(!h.context.snapshot().is_authenticated());
        assert!(SessionStore::new(storage).load_persisted().is_none());
    }

    #[tokio::test]
    async fn events_are_applied_in_order() {
        let h = harness();
        h.context.mount().await;
        let mut rx = h.context.watch();

        let events = &h.provider.events;
        events
            .send(AuthChangeEvent::new(AuthEventKind::SignedOut, None))
            .unwrap();
        events
            .send(AuthChangeEvent::new(
                AuthEventKind::SignedIn,
                Some(session("u1", "a")),
            ))
            .unwrap();
        events
            .send(AuthChangeEvent::new(
                AuthEventKind::TokenRefreshed,
                Some(session("u1", "b")),
            ))
            .unwrap();

        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            rx.wait_for(|s| s.session.as_ref().is_some_and(|s| s.token == "b")),
        )
        .await
        .unwrap()
        .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let snapshot = h.context.snapshot();
        assert_eq!(snapshot.session.unwrap().token, "b");
        assert_eq!(snapshot.phase, AuthPhase::Authenticated(Role::Admin));
    }

    #[tokio::test]
    async fn token_refresh_keeps_role_and_replaces_session() {
        let h = harness();
        h.context.mount().await;
        h.context.sign_in("u1@x.com", "pw", true).await.unwrap();
        let mut rx = h.context.watch();

        h.provider
            .events
            .send(AuthChangeEvent::new(
                AuthEventKind::TokenRefreshed,
                Some(session("u1", "tok-2")),
            ))
            .unwrap();

        let snapshot = rx
            .wait_for(|s| s.session.as_ref().is_some_and(|s| s.token == "tok-2"))
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.role, Some(Role::Admin));

        let persisted = SessionStore::new(h.storage.clone()).load_persisted().unwrap();
        assert_eq!(persisted.token, "tok-2");
    }

    #[tokio::test]
    async fn nothing_is_written_after_dispose() {
        let h = harness();
        h.context.mount().await;
        h.context.dispose();
        assert!(h.context.is_disposed());

        let result = h.context.sign_in("u1@x.com", "pw", true).await;
        assert!(result.is_ok());

        assert!(!h.context.snapshot().is_authenticated());
        assert!(SessionStore::new(h.storage.clone()).load_persisted().is_none());
        assert!(h.context.remembered_email().is_none());
    }

    #[tokio::test]
    async fn sign_up_requests_verification_callback() {
        struct CapturingProvider {
            inner: StubProvider,
            redirect: Mutex<Option<String>>,
        }

        #[async_trait::async_trait]
        impl AuthProvider for CapturingProvider {
            async fn sign_in_with_password(&self, e: &str, p: &str) -> Result<Session, ProviderError> {
                self.inner.sign_in_with_password(e, p).await
            }
            async fn sign_up(
                &self,
                email: &str,
                password: &str,
                options: SignUpOptions,
            ) -> Result<SignUpResult, ProviderError> {
                *self.redirect.lock().unwrap() = options.email_redirect_to.clone();
                self.inner.sign_up(email, password, options).await
            }
            async fn sign_out(&self, t: Option<&str>) -> Result<(), ProviderError> {
                self.inner.sign_out(t).await
            }
            async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
                self.inner.get_session().await
            }
            async fn set_session(&self, s: &Session) -> Result<Session, ProviderError> {
                self.inner.set_session(s).await
            }
            async fn get_user(&self, t: &str) -> Result<Identity, ProviderError> {
                self.inner.get_user(t).await
            }
            async fn refresh_session(&self) -> Result<Session, ProviderError> {
                self.inner.refresh_session().await
            }
            async fn reset_password_for_email(&self, e: &str, r: &str) -> Result<(), ProviderError> {
                self.inner.reset_password_for_email(e, r).await
            }
            fn subscribe(&self) -> AuthSubscription {
                self.inner.subscribe()
            }
        }

        let provider = Arc::new(CapturingProvider {
            inner: StubProvider::new(),
            redirect: Mutex::new(None),
        });
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        let context = AuthContext::new(
            provider.clone(),
            Arc::new(FixedRoles(Role::User)),
            Arc::new(SettingsStore::new(storage.clone())),
            Arc::new(SessionStore::new(storage)),
            Redirects::new(&AuthConfig::default()),
            "localhost",
        );

        let result = context.sign_up("a@x.com", "secret1", " Ada ").await.unwrap();
        assert_eq!(result.identity.metadata.full_name.as_deref(), Some("Ada"));
        assert_eq!(
            provider.redirect.lock().unwrap().as_deref(),
            Some("http://localhost:3000/auth/callback")
        );

        context.settings().update(&AuthSettingsPatch {
            require_email_verification: Some(false),
            ..Default::default()
        });
        context.sign_up("b@x.com", "secret1", "").await.unwrap();
        assert!(provider.redirect.lock().unwrap().is_none());
    }
}
