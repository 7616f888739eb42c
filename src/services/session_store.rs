//! Current session, optionally mirrored to durable storage.

use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

use crate::constants::storage_keys::{REMEMBER_CREDENTIALS, SESSION};
use crate::domain::{RememberedCredentials, Session};
use crate::storage::LocalStorage;

pub struct SessionStore {
    storage: Arc<dyn LocalStorage>,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self {
            storage,
            current: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_current(&self, session: Option<Session>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    pub fn persist(&self, session: &Session) {
        match serde_json::to_string(session) {
            Ok(raw) => {
                if let Err(e) = self.storage.set(SESSION, &raw) {
                    warn!(error = %e, "Failed to persist session");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize session"),
        }
    }

    /// The durable copy, if any. Corrupt records read as absent.
    #[must_use]
    pub fn load_persisted(&self) -> Option<Session> {
        match self.storage.get(SESSION) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(error = %e, "Persisted session is corrupt, ignoring it");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session");
                None
            }
        }
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        matches!(self.storage.get(SESSION), Ok(Some(_)))
    }

    pub fn forget_persisted(&self) {
        if let Err(e) = self.storage.remove(SESSION) {
            warn!(error = %e, "Failed to remove persisted session");
        }
    }

    pub fn remember_email(&self, email: &str) {
        let record = RememberedCredentials {
            email: email.to_string(),
        };
        match serde_json::to_string(&record) {
            Ok(raw) => {
                if let Err(e) = self.storage.set(REMEMBER_CREDENTIALS, &raw) {
                    warn!(error = %e, "Failed to persist remembered credentials");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize remembered credentials"),
        }
    }

    #[must_use]
    pub fn remembered_email(&self) -> Option<String> {
        let raw = match self.storage.get(REMEMBER_CREDENTIALS) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read remembered credentials");
                return None;
            }
        };

        match serde_json::from_str::<RememberedCredentials>(&raw) {
            Ok(record) => Some(record.email),
            Err(e) => {
                warn!(error = %e, "Remembered credentials are corrupt");
                None
            }
        }
    }

    pub fn forget_email(&self) {
        if let Err(e) = self.storage.remove(REMEMBER_CREDENTIALS) {
            warn!(error = %e, "Failed to remove remembered credentials");
        }
    }

    /// Drops the in-memory session, the durable copy and the remembered email.
    pub fn clear(&self) {
        self.set_current(None);
        self.forget_persisted();
        self.forget_email();
    }
}
