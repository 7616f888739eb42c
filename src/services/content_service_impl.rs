//! `SeaORM` implementations of `ContentBackend`.

use async_trait::async_trait;
use tracing::info;

use crate::db::Store;
use crate::models::{BlogPost, BlogPostDraft, BlogPostPatch, Project, ProjectDraft, ProjectPatch};
use crate::services::content_service::{ContentBackend, ContentError, ContentRecord};

fn not_found<R: ContentRecord>(id: &str) -> ContentError {
    ContentError::NotFound {
        collection: R::COLLECTION,
        id: id.to_string(),
    }
}

pub struct SeaOrmProjectBackend {
    store: Store,
}

impl SeaOrmProjectBackend {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ContentBackend<Project> for SeaOrmProjectBackend {
    async fn list_published(&self) -> Result<Vec<Project>, ContentError> {
        Ok(self.store.list_published_projects().await?)
    }

    async fn insert(
        &self,
        draft: &ProjectDraft,
        author_id: Option<&str>,
    ) -> Result<Project, ContentError> {
        Project::validate(draft)?;
        let project = self.store.insert_project(draft, author_id).await?;
        info!(id = %project.id, title = %project.title, "Project created");
        Ok(project)
    }

    async fn update(&self, id: &str, patch: &ProjectPatch) -> Result<Project, ContentError> {
        if patch.title.as_ref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ContentError::Validation("Project title is required".to_string()));
        }

        self.store
            .update_project(id, patch)
            .await?
            .ok_or_else(|| not_found::<Project>(id))
    }

    async fn delete(&self, id: &str) -> Result<(), ContentError> {
        if !self.store.delete_project(id).await? {
            return Err(not_found::<Project>(id));
        }
        info!(id, "Project deleted");
        Ok(())
    }
}

pub struct SeaOrmBlogPostBackend {
    store: Store,
}

impl SeaOrmBlogPostBackend {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ContentBackend<BlogPost> for SeaOrmBlogPostBackend {
    async fn list_published(&self) -> Result<Vec<BlogPost>, ContentError> {
        Ok(self.store.list_published_blog_posts().await?)
    }

    async fn insert(
        &self,
        draft: &BlogPostDraft,
        author_id: Option<&str>,
    ) -> Result<BlogPost, ContentError> {
        BlogPost::validate(draft)?;
        let post = self.store.insert_blog_post(draft, author_id).await?;
        info!(id = %post.id, title = %post.title, "Blog post created");
        Ok(post)
    }

    async fn update(&self, id: &str, patch: &BlogPostPatch) -> Result<BlogPost, ContentError> {
        if patch.title.as_ref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ContentError::Validation("Post title is required".to_string()));
        }

        self.store
            .update_blog_post(id, patch)
            .await?
            .ok_or_else(|| not_found::<BlogPost>(id))
    }

    async fn delete(&self, id: &str) -> Result<(), ContentError> {
        if !self.store.delete_blog_post(id).await? {
            return Err(not_found::<BlogPost>(id));
        }
        info!(id, "Blog post deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> Store {
        Store::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn empty_collection_lists_nothing() {
        let backend = SeaOrmProjectBackend::new(store().await);
        assert!(backend.list_published().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unpublished_projects_are_hidden() {
        let backend = SeaOrmProjectBackend::new(store().await);
        let draft = ProjectDraft {
            title: "Hidden".to_string(),
            description: "wip".to_string(),
            published: false,
            ..Default::default()
        };
        backend.insert(&draft, None).await.unwrap();
        assert!(backend.list_published().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn technologies_drop_duplicates_keep_order() {
        let backend = SeaOrmProjectBackend::new(store().await);
        let draft = ProjectDraft {
            title: "Folio".to_string(),
            description: "portfolio".to_string(),
            technologies: vec![
                "Rust".to_string(),
                "axum".to_string(),
                "rust".to_string(),
                " ".to_string(),
            ],
            published: true,
            ..Default::default()
        };
        let project = backend.insert(&draft, Some("u1")).await.unwrap();
        assert_eq!(project.technologies, vec!["Rust", "axum"]);
        assert_eq!(project.author_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let backend = SeaOrmBlogPostBackend::new(store().await);
        assert!(matches!(
            backend.update("nope", &BlogPostPatch::default()).await,
            Err(ContentError::NotFound { .. })
        ));
        assert!(matches!(
            backend.delete("nope").await,
            Err(ContentError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn blank_titles_are_rejected() {
        let backend = SeaOrmBlogPostBackend::new(store().await);
        let draft = BlogPostDraft {
            title: "   ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            backend.insert(&draft, None).await,
            Err(ContentError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn republishing_stamps_published_at() {
        let backend = SeaOrmBlogPostBackend::new(store().await);
        let draft = BlogPostDraft {
            title: "Draft".to_string(),
            published: false,
            ..Default::default()
        };
        let post = backend.insert(&draft, None).await.unwrap();

        let published = backend
            .update(
                &post.id,
                &BlogPostPatch {
                    published: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(published.published);
        assert!(published.published_at >= post.published_at);
        assert_eq!(backend.list_published().await.unwrap().len(), 1);
    }
}
