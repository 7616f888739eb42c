use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::models::{BlogPost, Project};
use crate::services::{
    AuthContext, AuthProvider, ContentBackend, ContentLoader, Redirects, RoleService,
    SeaOrmAuthProvider, SeaOrmBlogPostBackend, SeaOrmProjectBackend, SeaOrmRoleService,
    SessionStore, SettingsStore,
};
use crate::storage::LocalStorage;

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub accounts: Arc<SeaOrmAuthProvider>,

    pub roles: Arc<dyn RoleService>,

    pub projects: Arc<dyn ContentBackend<Project>>,

    pub blog_posts: Arc<dyn ContentBackend<BlogPost>>,

    pub redirects: Redirects,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Ok(Self::with_store(config, store))
    }

    #[must_use]
    pub fn with_store(config: Config, store: Store) -> Self {
        let accounts = Arc::new(SeaOrmAuthProvider::new(
            store.clone(),
            &config.auth,
            &config.security,
        ));
        let roles = Arc::new(SeaOrmRoleService::new(
            store.clone(),
            config.auth.admin_emails.clone(),
        )) as Arc<dyn RoleService>;
        let projects =
            Arc::new(SeaOrmProjectBackend::new(store.clone())) as Arc<dyn ContentBackend<Project>>;
        let blog_posts = Arc::new(SeaOrmBlogPostBackend::new(store.clone()))
            as Arc<dyn ContentBackend<BlogPost>>;
        let redirects = Redirects::new(&config.auth);

        Self {
            config: Arc::new(RwLock::new(config)),
            store,
            accounts,
            roles,
            projects,
            blog_posts,
            redirects,
        }
    }

    #[must_use]
    pub fn auth_provider(&self) -> Arc<dyn AuthProvider> {
        self.accounts.clone()
    }

    /// Builds an unmounted auth context whose stores live in `storage`.
    pub async fn auth_context(&self, storage: Arc<dyn LocalStorage>) -> AuthContext {
        let hostname = self.config.read().await.auth.hostname.clone();
        AuthContext::new(
            self.auth_provider(),
            self.roles.clone(),
            Arc::new(SettingsStore::new(storage.clone())),
            Arc::new(SessionStore::new(storage)),
            self.redirects.clone(),
            hostname,
        )
    }

    pub async fn project_loader(&self, context: &AuthContext) -> ContentLoader<Project> {
        let require_admin = self.config.read().await.content.require_admin_for_writes;
        ContentLoader::new(self.projects.clone(), context.watch(), require_admin)
    }

    pub async fn blog_post_loader(&self, context: &AuthContext) -> ContentLoader<BlogPost> {
        let require_admin = self.config.read().await.content.require_admin_for_writes;
        ContentLoader::new(self.blog_posts.clone(), context.watch(), require_admin)
    }
}
