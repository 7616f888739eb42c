//! Domain types for identities, sessions, roles and auth feature flags.
//!
//! Identities and sessions are owned by the identity provider and only
//! mirrored here; profiles and roles live in the relational store.

pub mod events;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Optional profile data attached to an identity at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// The authenticated principal as known to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub metadata: IdentityMetadata,
}

/// A live, token-bearing authorization for an [`Identity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.identity.id
    }
}

/// Coarse authorization level stored alongside profile data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Anything that is not exactly `admin` is treated as a plain user.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::User
        }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile record kept in the relational store, one per identity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

/// Editable profile fields; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub avatar: Option<String>,
}

/// Persisted feature flags gating auth operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSettings {
    pub enable_registration: bool,
    pub require_email_verification: bool,
    pub enable_password_reset: bool,
    pub enable_social_login: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            enable_registration: true,
            require_email_verification: true,
            enable_password_reset: true,
            enable_social_login: false,
        }
    }
}

impl AuthSettings {
    /// Shallow merge: every flag present in `patch` wins.
    #[must_use]
    pub fn merged(self, patch: &AuthSettingsPatch) -> Self {
        Self {
            enable_registration: patch.enable_registration.unwrap_or(self.enable_registration),
            require_email_verification: patch
                .require_email_verification
                .unwrap_or(self.require_email_verification),
            enable_password_reset: patch
                .enable_password_reset
                .unwrap_or(self.enable_password_reset),
            enable_social_login: patch.enable_social_login.unwrap_or(self.enable_social_login),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_registration: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_email_verification: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_password_reset: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_social_login: Option<bool>,
}

impl AuthSettingsPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.enable_registration.is_none()
            && self.require_email_verification.is_none()
            && self.enable_password_reset.is_none()
            && self.enable_social_login.is_none()
    }
}

/// Remembered sign-in email. The password is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RememberedCredentials {
    pub email: String,
}
