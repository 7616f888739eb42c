//! Domain service for user profiles and the roles stored on them.

use thiserror::Error;

use crate::domain::{Identity, ProfilePatch, Role, UserProfile};

/// Errors specific to profile operations.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for ProfileError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ProfileError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

#[async_trait::async_trait]
pub trait RoleService: Send + Sync {
    /// Never fails: a missing profile or a failed lookup resolves to
    /// [`Role::User`].
    async fn resolve_role(&self, user_id: &str) -> Role;

    /// Creates the profile for `identity`, or refreshes its email, name and
    /// avatar when it already exists. Concurrent duplicate attempts succeed.
    async fn upsert_profile(&self, identity: &Identity) -> Result<(), ProfileError>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, ProfileError>;

    /// # Errors
    ///
    /// Returns [`ProfileError::NotFound`] if no profile exists for `user_id`.
    async fn set_role(&self, user_id: &str, role: Role) -> Result<(), ProfileError>;

    async fn update_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<UserProfile, ProfileError>;
}
