//! Domain service contracts for the two content collections.
//!
//! Projects and blog posts share one shape: a published listing plus
//! insert, update-by-id and delete-by-id. [`ContentRecord`] names the
//! per-collection types and [`ContentBackend`] is the store behind them.

use serde::Serialize;
use thiserror::Error;

use crate::models::{BlogPost, BlogPostDraft, BlogPostPatch, Project, ProjectDraft, ProjectPatch};

/// Errors specific to content operations.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Sign in to change content")]
    Unauthenticated,

    #[error("Only admins can change content")]
    Forbidden,

    #[error("{collection} entry not found: {id}")]
    NotFound { collection: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for ContentError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ContentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

pub trait ContentRecord: Clone + Send + Sync + 'static {
    /// The entity as edited in a form.
    type Draft: Clone + Send + Sync;

    /// Partial update; a whole draft converts into one.
    type Patch: Clone + Send + Sync + From<Self::Draft>;

    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    fn draft_id(draft: &Self::Draft) -> &str;

    /// Checks the user-entered fields before anything is written.
    fn validate(draft: &Self::Draft) -> Result<(), ContentError>;
}

impl ContentRecord for Project {
    type Draft = ProjectDraft;
    type Patch = ProjectPatch;

    const COLLECTION: &'static str = "projects";

    fn id(&self) -> &str {
        &self.id
    }

    fn draft_id(draft: &ProjectDraft) -> &str {
        &draft.id
    }

    fn validate(draft: &ProjectDraft) -> Result<(), ContentError> {
        if draft.title.trim().is_empty() {
            return Err(ContentError::Validation("Project title is required".to_string()));
        }
        if draft.description.trim().is_empty() {
            return Err(ContentError::Validation(
                "Project description is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl ContentRecord for BlogPost {
    type Draft = BlogPostDraft;
    type Patch = BlogPostPatch;

    const COLLECTION: &'static str = "blog_posts";

    fn id(&self) -> &str {
        &self.id
    }

    fn draft_id(draft: &BlogPostDraft) -> &str {
        &draft.id
    }

    fn validate(draft: &BlogPostDraft) -> Result<(), ContentError> {
        if draft.title.trim().is_empty() {
            return Err(ContentError::Validation("Post title is required".to_string()));
        }
        Ok(())
    }
}

/// Outcome of a listing. Failures come back as an error message next to
/// an empty list instead of an `Err`.
#[derive(Debug, Clone, Serialize)]
pub struct LoadResult<R> {
    pub data: Vec<R>,
    pub error: Option<String>,
}

impl<R> LoadResult<R> {
    #[must_use]
    pub const fn ok(data: Vec<R>) -> Self {
        Self { data, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[async_trait::async_trait]
pub trait ContentBackend<R: ContentRecord>: Send + Sync {
    /// Published entries, newest first; equal timestamps order by id.
    async fn list_published(&self) -> Result<Vec<R>, ContentError>;

    /// The store assigns the id; any id on `draft` is ignored.
    async fn insert(&self, draft: &R::Draft, author_id: Option<&str>) -> Result<R, ContentError>;

    /// # Errors
    ///
    /// Returns [`ContentError::NotFound`] when `id` does not exist.
    async fn update(&self, id: &str, patch: &R::Patch) -> Result<R, ContentError>;

    /// # Errors
    ///
    /// Returns [`ContentError::NotFound`] when `id` does not exist.
    async fn delete(&self, id: &str) -> Result<(), ContentError>;
}
