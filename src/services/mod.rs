pub mod settings;
pub use settings::SettingsStore;

pub mod session_store;
pub use session_store::SessionStore;

pub mod auth_provider;
pub mod auth_provider_impl;
pub use auth_provider::{
    AuthProvider, AuthSubscription, ProviderError, SignUpOptions, SignUpResult,
};
pub use auth_provider_impl::SeaOrmAuthProvider;

pub mod role_service;
pub mod role_service_impl;
pub use role_service::{ProfileError, RoleService};
pub use role_service_impl::SeaOrmRoleService;

pub mod redirect;
pub use redirect::Redirects;

pub mod auth_context;
pub use auth_context::{AuthContext, AuthError, AuthPhase, AuthSnapshot, Feature};

pub mod content_service;
pub mod content_service_impl;
pub use content_service::{ContentBackend, ContentError, ContentRecord, LoadResult};
pub use content_service_impl::{SeaOrmBlogPostBackend, SeaOrmProjectBackend};

pub mod content_loader;
pub use content_loader::ContentLoader;
