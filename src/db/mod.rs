use crate::config::SecurityConfig;
use crate::domain::{Identity, ProfilePatch, Role, UserProfile};
use crate::models::{BlogPost, BlogPostDraft, BlogPostPatch, Project, ProjectDraft, ProjectPatch};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, SqlErr, Statement,
};
use std::path::Path;
use std::time::Duration as StdDuration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::account::{Account, AuthSessionRow, NewAccount};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        // Every pooled connection to `:memory:` would see its own empty database
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(StdDuration::from_secs(10))
            .acquire_timeout(StdDuration::from_secs(10))
            .idle_timeout(StdDuration::from_secs(300))
            .max_lifetime(StdDuration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn account_repo(&self) -> repositories::account::AccountRepository {
        repositories::account::AccountRepository::new(self.conn.clone())
    }

    fn profile_repo(&self) -> repositories::profile::ProfileRepository {
        repositories::profile::ProfileRepository::new(self.conn.clone())
    }

    fn project_repo(&self) -> repositories::project::ProjectRepository {
        repositories::project::ProjectRepository::new(self.conn.clone())
    }

    fn blog_post_repo(&self) -> repositories::blog_post::BlogPostRepository {
        repositories::blog_post::BlogPostRepository::new(self.conn.clone())
    }

    // ========================================================================
    // Accounts & auth sessions
    // ========================================================================

    pub async fn create_account(
        &self,
        new: NewAccount<'_>,
        config: &SecurityConfig,
    ) -> Result<Account> {
        self.account_repo().create(new, config).await
    }

    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.account_repo().get_by_email(email).await
    }

    pub async fn get_account(&self, id: &str) -> Result<Option<Account>> {
        self.account_repo().get_by_id(id).await
    }

    pub async fn verify_account_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Account>> {
        self.account_repo().verify_password(email, password).await
    }

    pub async fn confirm_account_email(&self, email: &str) -> Result<bool> {
        self.account_repo().confirm_email(email).await
    }

    pub async fn mark_recovery_sent(&self, email: &str) -> Result<bool> {
        self.account_repo().mark_recovery_sent(email).await
    }

    pub async fn create_auth_session(
        &self,
        account_id: &str,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>)> {
        self.account_repo().create_session(account_id, ttl).await
    }

    pub async fn get_auth_session(&self, token: &str) -> Result<Option<AuthSessionRow>> {
        self.account_repo().get_session(token).await
    }

    pub async fn delete_auth_session(&self, token: &str) -> Result<bool> {
        self.account_repo().delete_session(token).await
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    pub async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>> {
        self.profile_repo().get(id).await
    }

    pub async fn upsert_profile(&self, identity: &Identity, initial_role: Role) -> Result<()> {
        self.profile_repo().upsert(identity, initial_role).await
    }

    pub async fn set_profile_role(&self, id: &str, role: Role) -> Result<bool> {
        self.profile_repo().set_role(id, role).await
    }

    pub async fn update_profile(
        &self,
        id: &str,
        patch: &ProfilePatch,
    ) -> Result<Option<UserProfile>> {
        self.profile_repo().update(id, patch).await
    }

    // ========================================================================
    // Projects
    // ========================================================================

    pub async fn list_published_projects(&self) -> Result<Vec<Project>> {
        self.project_repo().list_published().await
    }

    pub async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        self.project_repo().get(id).await
    }

    pub async fn insert_project(
        &self,
        draft: &ProjectDraft,
        author_id: Option<&str>,
    ) -> Result<Project> {
        self.project_repo().insert(draft, author_id).await
    }

    pub async fn update_project(&self, id: &str, patch: &ProjectPatch) -> Result<Option<Project>> {
        self.project_repo().update(id, patch).await
    }

    pub async fn delete_project(&self, id: &str) -> Result<bool> {
        self.project_repo().delete(id).await
    }

    // ========================================================================
    // Blog posts
    // ========================================================================

    pub async fn list_published_blog_posts(&self) -> Result<Vec<BlogPost>> {
        self.blog_post_repo().list_published().await
    }

    pub async fn get_blog_post(&self, id: &str) -> Result<Option<BlogPost>> {
        self.blog_post_repo().get(id).await
    }

    pub async fn insert_blog_post(
        &self,
        draft: &BlogPostDraft,
        author_id: Option<&str>,
    ) -> Result<BlogPost> {
        self.blog_post_repo().insert(draft, author_id).await
    }

    pub async fn update_blog_post(
        &self,
        id: &str,
        patch: &BlogPostPatch,
    ) -> Result<Option<BlogPost>> {
        self.blog_post_repo().update(id, patch).await
    }

    pub async fn delete_blog_post(&self, id: &str) -> Result<bool> {
        self.blog_post_repo().delete(id).await
    }
}

/// True when any cause in the chain is a unique/primary-key violation.
#[must_use]
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<DbErr>().and_then(DbErr::sql_err),
            Some(SqlErr::UniqueConstraintViolation(_))
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_detection_ignores_other_errors() {
        let err = anyhow::Error::new(DbErr::Custom("boom".to_string())).context("while inserting");
        assert!(!is_unique_violation(&err));

        let err = anyhow::anyhow!("plain failure");
        assert!(!is_unique_violation(&err));
    }
}
