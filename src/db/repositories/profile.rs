use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, Set, sea_query::OnConflict,
};

use crate::domain::{Identity, ProfilePatch, Role, UserProfile};
use crate::entities::{prelude::*, users};
use crate::models::timestamp_now;

/// Repository for user profile rows (one per identity id)
pub struct ProfileRepository {
    conn: DatabaseConnection,
}

impl ProfileRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: users::Model) -> UserProfile {
        UserProfile {
            role: Role::parse_lenient(&m.role),
            id: m.id,
            email: m.email,
            full_name: m.full_name,
            avatar: m.avatar,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<UserProfile>> {
        let row = Users::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query user profile")?;

        Ok(row.map(Self::map_model))
    }

    /// Single-statement insert-or-update keyed by id.
    ///
    /// On conflict only email, full name, avatar and `updated_at` change;
    /// role and `created_at` keep whatever the first insert wrote.
    pub async fn upsert(&self, identity: &Identity, initial_role: Role) -> Result<()> {
        let now = timestamp_now();
        let model = users::ActiveModel {
            id: Set(identity.id.clone()),
            email: Set(identity.email.clone()),
            full_name: Set(identity.metadata.full_name.clone().unwrap_or_default()),
            avatar: Set(identity.metadata.avatar_url.clone().unwrap_or_default()),
            role: Set(initial_role.as_str().to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        Users::insert(model)
            .on_conflict(
                OnConflict::column(users::Column::Id)
                    .update_columns([
                        users::Column::Email,
                        users::Column::FullName,
                        users::Column::Avatar,
                        users::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to upsert user profile")?;

        Ok(())
    }

    pub async fn set_role(&self, id: &str, role: Role) -> Result<bool> {
        let Some(row) = Users::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query user profile for role change")?
        else {
            return Ok(false);
        };

        let mut active: users::ActiveModel = row.into();
        active.role = Set(role.as_str().to_string());
        active.updated_at = Set(timestamp_now());
        active.update(&self.conn).await?;

        Ok(true)
    }

    pub async fn update(&self, id: &str, patch: &ProfilePatch) -> Result<Option<UserProfile>> {
        let Some(row) = Users::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query user profile for update")?
        else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = row.into();
        if let Some(full_name) = &patch.full_name {
            active.full_name = Set(full_name.clone());
        }
        if let Some(avatar) = &patch.avatar {
            active.avatar = Set(avatar.clone());
        }
        active.updated_at = Set(timestamp_now());

        let updated = active.update(&self.conn).await?;
        Ok(Some(Self::map_model(updated)))
    }
}
