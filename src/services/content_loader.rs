//! Write-through local view of one content collection.
//!
//! Local items only change after the backing store accepted the write, so
//! a failed write never shows up as a phantom entry.

use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::services::auth_context::AuthSnapshot;
use crate::services::content_service::{ContentBackend, ContentError, ContentRecord, LoadResult};

pub struct ContentLoader<R: ContentRecord> {
    backend: Arc<dyn ContentBackend<R>>,
    auth: watch::Receiver<AuthSnapshot>,
    require_admin: bool,
    items: RwLock<Vec<R>>,
}

impl<R: ContentRecord> ContentLoader<R> {
    pub fn new(
        backend: Arc<dyn ContentBackend<R>>,
        auth: watch::Receiver<AuthSnapshot>,
        require_admin: bool,
    ) -> Self {
        Self {
            backend,
            auth,
            require_admin,
            items: RwLock::new(Vec::new()),
        }
    }

    /// Fetches published entries without touching local items.
    pub async fn list(&self) -> LoadResult<R> {
        match self.backend.list_published().await {
            Ok(data) => LoadResult::ok(data),
            Err(e) => {
                error!(collection = R::COLLECTION, error = %e, "Failed to list content");
                LoadResult::failed(e.to_string())
            }
        }
    }

    /// Fetches published entries and replaces local items with them. On
    /// failure local items are left alone.
    pub async fn load(&self) -> LoadResult<R> {
        let result = self.list().await;
        if result.is_ok() {
            *self.items.write().unwrap_or_else(PoisonError::into_inner) = result.data.clone();
        }
        result
    }

    #[must_use]
    pub fn items(&self) -> Vec<R> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// An entry is an update only when it carries a non-empty id that is
    /// already among the local items.
    #[must_use]
    pub fn is_update(&self, draft: &R::Draft) -> bool {
        let id = R::draft_id(draft);
        !id.is_empty()
            && self
                .items
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .any(|item| item.id() == id)
    }

    fn authorize(&self) -> Result<String, ContentError> {
        let snapshot = self.auth.borrow();
        let Some(user_id) = snapshot.user_id().filter(|_| snapshot.is_authenticated()) else {
            return Err(ContentError::Unauthenticated);
        };
        if self.require_admin && !snapshot.is_admin() {
            return Err(ContentError::Forbidden);
        }
        Ok(user_id.to_string())
    }

    pub async fn create(&self, draft: &R::Draft) -> Result<R, ContentError> {
        let author_id = self.authorize()?;

        let record = self
            .backend
            .insert(draft, Some(&author_id))
            .await
            .inspect_err(|e| warn!(collection = R::COLLECTION, error = %e, "Create failed"))?;

        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, record.clone());

        info!(collection = R::COLLECTION, id = record.id(), "Entry created");
        Ok(record)
    }

    pub async fn update(&self, id: &str, patch: &R::Patch) -> Result<R, ContentError> {
        self.authorize()?;

        let record = self
            .backend
            .update(id, patch)
            .await
            .inspect_err(|e| warn!(collection = R::COLLECTION, id, error = %e, "Update failed"))?;

        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = items.iter_mut().find(|item| item.id() == id) {
            *slot = record.clone();
        }

        Ok(record)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ContentError> {
        self.authorize()?;

        self.backend
            .delete(id)
            .await
            .inspect_err(|e| warn!(collection = R::COLLECTION, id, error = %e, "Delete failed"))?;

        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|item| item.id() != id);

        Ok(())
    }

    /// Routes a form-edited entry to `update` or `create`.
    pub async fn save(&self, draft: R::Draft) -> Result<R, ContentError> {
        if self.is_update(&draft) {
            let id = R::draft_id(&draft).to_string();
            self.update(&id, &R::Patch::from(draft)).await
        } else {
            self.create(&draft).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Identity, IdentityMetadata, Role, Session};
    use crate::models::{BlogPost, BlogPostDraft, BlogPostPatch};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory backend that records which write path was taken.
    #[derive(Default)]
    struct MemoryBackend {
        rows: Mutex<Vec<BlogPost>>,
        inserts: AtomicUsize,
        updates: AtomicUsize,
        fail: bool,
    }

    fn post(id: &str, title: &str) -> BlogPost {
        BlogPost {
            id: id.to_string(),
            title: title.to_string(),
            excerpt: String::new(),
            content: String::new(),
            author: String::new(),
            author_id: None,
            tags: Vec::new(),
            image: None,
            featured: false,
            published: true,
            published_at: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[async_trait::async_trait]
    impl ContentBackend<BlogPost> for MemoryBackend {
        async fn list_published(&self) -> Result<Vec<BlogPost>, ContentError> {
            if self.fail {
                return Err(ContentError::Database("offline".to_string()));
            }
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn insert(
            &self,
            draft: &BlogPostDraft,
            author_id: Option<&str>,
        ) -> Result<BlogPost, ContentError> {
            if self.fail {
                return Err(ContentError::Database("offline".to_string()));
            }
            let n = self.inserts.fetch_add(1, Ordering::SeqCst);
            let mut record = post(&format!("srv-{n}"), &draft.title);
            record.author_id = author_id.map(str::to_string);
            self.rows.lock().unwrap().insert(0, record.clone());
            Ok(record)
        }

        async fn update(&self, id: &str, patch: &BlogPostPatch) -> Result<BlogPost, ContentError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| ContentError::NotFound {
                    collection: "blog_posts",
                    id: id.to_string(),
                })?;
            if let Some(title) = &patch.title {
                row.title = title.clone();
            }
            Ok(row.clone())
        }

        async fn delete(&self, id: &str) -> Result<(), ContentError> {
            self.rows.lock().unwrap().retain(|r| r.id != id);
            Ok(())
        }
    }

    fn signed_in(role: Role) -> AuthSnapshot {
        let session = Session {
            token: "t".to_string(),
            identity: Identity {
                id: "u1".to_string(),
                email: "a@x.com".to_string(),
                metadata: IdentityMetadata::default(),
            },
            expires_at: None,
        };
        AuthSnapshot {
            phase: crate::services::auth_context::AuthPhase::Authenticated(role),
            user: Some(session.identity.clone()),
            session: Some(session),
            role: Some(role),
            loading: false,
        }
    }

    fn signed_out() -> AuthSnapshot {
        AuthSnapshot {
            phase: crate::services::auth_context::AuthPhase::Unauthenticated,
            user: None,
            session: None,
            role: None,
            loading: false,
        }
    }

    fn loader(
        backend: Arc<MemoryBackend>,
        snapshot: AuthSnapshot,
        require_admin: bool,
    ) -> (ContentLoader<BlogPost>, watch::Sender<AuthSnapshot>) {
        let (tx, rx) = watch::channel(snapshot);
        (ContentLoader::new(backend, rx, require_admin), tx)
    }

    fn draft(id: &str, title: &str) -> BlogPostDraft {
        BlogPostDraft {
            id: id.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_collection_loads_empty() {
        let (loader, _tx) = loader(Arc::default(), signed_out(), false);
        let result = loader.load().await;
        assert!(result.is_ok());
        assert!(result.data.is_empty());
    }

    #[tokio::test]
    async fn failed_load_returns_error_and_keeps_items() {
        let backend = Arc::new(MemoryBackend {
            fail: true,
            ..Default::default()
        });
        let (loader, _tx) = loader(backend, signed_in(Role::User), false);
        loader.items.write().unwrap().push(post("keep", "Kept"));

        let result = loader.load().await;
        assert_eq!(result.error.as_deref(), Some("Database error: offline"));
        assert!(result.data.is_empty());
        assert_eq!(loader.items().len(), 1);
    }

    #[tokio::test]
    async fn save_routes_by_known_id() {
        let backend = Arc::new(MemoryBackend::default());
        let (loader, _tx) = loader(backend.clone(), signed_in(Role::User), false);

        // Empty id creates
        let created = loader.save(draft("", "Post A")).await.unwrap();
        assert_eq!(backend.inserts.load(Ordering::SeqCst), 1);

        // Non-empty id absent from local items also creates
        loader.save(draft("client-123", "Post B")).await.unwrap();
        assert_eq!(backend.inserts.load(Ordering::SeqCst), 2);
        assert_eq!(backend.updates.load(Ordering::SeqCst), 0);

        // Known id updates
        loader
            .save(draft(&created.id, "Post A, revised"))
            .await
            .unwrap();
        assert_eq!(backend.inserts.load(Ordering::SeqCst), 2);
        assert_eq!(backend.updates.load(Ordering::SeqCst), 1);

        let titles: Vec<_> = loader.items().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["Post B", "Post A, revised"]);
    }

    #[tokio::test]
    async fn created_entries_go_first_with_owner() {
        let (loader, _tx) = loader(Arc::default(), signed_in(Role::User), false);
        loader.create(&draft("", "Older")).await.unwrap();
        let newest = loader.create(&draft("", "Newer")).await.unwrap();

        assert_eq!(loader.items()[0].id, newest.id);
        assert_eq!(newest.author_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn failed_create_leaves_items_untouched() {
        let backend = Arc::new(MemoryBackend {
            fail: true,
            ..Default::default()
        });
        let (loader, _tx) = loader(backend, signed_in(Role::User), false);
        assert!(loader.create(&draft("", "Nope")).await.is_err());
        assert!(loader.items().is_empty());
    }

    #[tokio::test]
    async fn writes_require_a_session() {
        let backend = Arc::new(MemoryBackend::default());
        let (loader, tx) = loader(backend.clone(), signed_out(), false);

        assert!(matches!(
            loader.create(&draft("", "A")).await,
            Err(ContentError::Unauthenticated)
        ));
        assert_eq!(backend.inserts.load(Ordering::SeqCst), 0);

        tx.send_replace(signed_in(Role::User));
        loader.create(&draft("", "A")).await.unwrap();
    }

    #[tokio::test]
    async fn admin_requirement_is_enforced() {
        let (loader, tx) = loader(Arc::default(), signed_in(Role::User), true);
        assert!(matches!(
            loader.create(&draft("", "A")).await,
            Err(ContentError::Forbidden)
        ));

        tx.send_replace(signed_in(Role::Admin));
        loader.create(&draft("", "A")).await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_local_entry() {
        let (loader, _tx) = loader(Arc::default(), signed_in(Role::User), false);
        let created = loader.create(&draft("", "A")).await.unwrap();

        loader.delete(&created.id).await.unwrap();
        assert!(loader.items().is_empty());
    }
}
