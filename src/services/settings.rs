//! Persisted auth feature flags.
//!
//! Storage failures never escape: they are logged, defaults (or the
//! in-memory value) are used and the caller carries on.

use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::constants::storage_keys::AUTH_SETTINGS;
use crate::domain::{AuthSettings, AuthSettingsPatch};
use crate::storage::LocalStorage;

pub struct SettingsStore {
    storage: Arc<dyn LocalStorage>,
    current: RwLock<AuthSettings>,
}

impl SettingsStore {
    /// Creates the store and immediately loads any persisted flags.
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        let store = Self {
            storage,
            current: RwLock::new(AuthSettings::default()),
        };
        store.load();
        store
    }

    /// Re-reads the persisted record. Missing or corrupt data yields the
    /// defaults; a corrupt record is left in place.
    pub fn load(&self) -> AuthSettings {
        let settings = match self.storage.get(AUTH_SETTINGS) {
            Ok(Some(raw)) => match serde_json::from_str::<AuthSettings>(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(error = %e, "Stored auth settings are corrupt, using defaults");
                    AuthSettings::default()
                }
            },
            Ok(None) => AuthSettings::default(),
            Err(e) => {
                warn!(error = %e, "Failed to read auth settings, using defaults");
                AuthSettings::default()
            }
        };

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = settings;
        settings
    }

    #[must_use]
    pub fn current(&self) -> AuthSettings {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shallow-merges `patch` and persists the full merged object.
    pub fn update(&self, patch: &AuthSettingsPatch) -> AuthSettings {
        let merged = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *current = current.merged(patch);
            *current
        };

        match serde_json::to_string(&merged) {
            Ok(raw) => {
                if let Err(e) = self.storage.set(AUTH_SETTINGS, &raw) {
                    warn!(error = %e, "Failed to persist auth settings");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize auth settings"),
        }

        debug!(?merged, "Auth settings updated");
        merged
    }

    /// Restores defaults and drops the persisted record.
    pub fn reset(&self) -> AuthSettings {
        let defaults = AuthSettings::default();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = defaults;

        if let Err(e) = self.storage.remove(AUTH_SETTINGS) {
            warn!(error = %e, "Failed to remove persisted auth settings");
        }

        defaults
    }
}
