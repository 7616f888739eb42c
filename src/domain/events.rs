//! Change notifications emitted by the identity provider.

use serde::Serialize;

use super::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl AuthEventKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthChangeEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthChangeEvent {
    #[must_use]
    pub const fn new(kind: AuthEventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }
}
