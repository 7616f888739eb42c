//! `SeaORM` implementation of the `RoleService` trait.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::db::{Store, is_unique_violation};
use crate::domain::{Identity, ProfilePatch, Role, UserProfile};
use crate::services::role_service::{ProfileError, RoleService};

pub struct SeaOrmRoleService {
    store: Store,
    admin_emails: Vec<String>,
}

impl SeaOrmRoleService {
    #[must_use]
    pub const fn new(store: Store, admin_emails: Vec<String>) -> Self {
        Self {
            store,
            admin_emails,
        }
    }

    fn initial_role(&self, email: &str) -> Role {
        if self
            .admin_emails
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(email.trim()))
        {
            Role::Admin
        } else {
            Role::User
        }
    }
}

#[async_trait]
impl RoleService for SeaOrmRoleService {
    async fn resolve_role(&self, user_id: &str) -> Role {
        match self.store.get_profile(user_id).await {
            Ok(Some(profile)) => profile.role,
            Ok(None) => {
                debug!(user_id, "No profile found, defaulting to user role");
                Role::User
            }
            Err(e) => {
                warn!(user_id, error = %e, "Role lookup failed, defaulting to user role");
                Role::User
            }
        }
    }

    async fn upsert_profile(&self, identity: &Identity) -> Result<(), ProfileError> {
        let role = self.initial_role(&identity.email);

        match self.store.upsert_profile(identity, role).await {
            Ok(()) => {
                debug!(user_id = %identity.id, "Profile upserted");
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => {
                warn!(
                    user_id = %identity.id,
                    error = %e,
                    "Profile upsert hit a unique constraint, treating as done"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, ProfileError> {
        Ok(self.store.get_profile(user_id).await?)
    }

    async fn set_role(&self, user_id: &str, role: Role) -> Result<(), ProfileError> {
        if !self.store.set_profile_role(user_id, role).await? {
            return Err(ProfileError::NotFound(user_id.to_string()));
        }

        info!(user_id, %role, "Role updated");
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<UserProfile, ProfileError> {
        self.store
            .update_profile(user_id, patch)
            .await?
            .ok_or_else(|| ProfileError::NotFound(user_id.to_string()))
    }
}
