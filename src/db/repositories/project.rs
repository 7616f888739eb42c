use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{prelude::*, projects};
use crate::models::{Project, ProjectDraft, ProjectPatch, normalize_tags, timestamp_now};

/// Repository for portfolio projects
pub struct ProjectRepository {
    conn: DatabaseConnection,
}

impl ProjectRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: projects::Model) -> Project {
        Project {
            technologies: serde_json::from_str(&m.technologies).unwrap_or_default(),
            id: m.id,
            title: m.title,
            description: m.description,
            image: m.image,
            github: m.github,
            demo: m.demo,
            featured: m.featured,
            published: m.published,
            author_id: m.author_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }

    /// Published projects, newest first; equal timestamps fall back to id order.
    pub async fn list_published(&self) -> Result<Vec<Project>> {
        let rows = Projects::find()
            .filter(projects::Column::Published.eq(true))
            .order_by_desc(projects::Column::CreatedAt)
            .order_by_asc(projects::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list projects")?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Project>> {
        let row = Projects::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query project")?;

        Ok(row.map(Self::map_model))
    }

    pub async fn insert(&self, draft: &ProjectDraft, author_id: Option<&str>) -> Result<Project> {
        let now = timestamp_now();
        let model = projects::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            title: Set(draft.title.trim().to_string()),
            description: Set(draft.description.clone()),
            technologies: Set(serde_json::to_string(&normalize_tags(&draft.technologies))?),
            image: Set(draft.image.clone()),
            github: Set(draft.github.clone()),
            demo: Set(draft.demo.clone()),
            featured: Set(draft.featured),
            published: Set(draft.published),
            author_id: Set(author_id.map(str::to_string)),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let inserted = model
            .insert(&self.conn)
            .await
            .context("Failed to insert project")?;

        Ok(Self::map_model(inserted))
    }

    pub async fn update(&self, id: &str, patch: &ProjectPatch) -> Result<Option<Project>> {
        let Some(row) = Projects::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query project for update")?
        else {
            return Ok(None);
        };

        let mut active: projects::ActiveModel = row.into();
        if let Some(title) = &patch.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(description) = &patch.description {
            active.description = Set(description.clone());
        }
        if let Some(technologies) = &patch.technologies {
            active.technologies = Set(serde_json::to_string(&normalize_tags(technologies))?);
        }
        if let Some(image) = &patch.image {
            active.image = Set(image.clone());
        }
        if let Some(github) = &patch.github {
            active.github = Set(github.clone());
        }
        if let Some(demo) = &patch.demo {
            active.demo = Set(demo.clone());
        }
        if let Some(featured) = patch.featured {
            active.featured = Set(featured);
        }
        if let Some(published) = patch.published {
            active.published = Set(published);
        }
        active.updated_at = Set(timestamp_now());

        let updated = active
            .update(&self.conn)
            .await
            .context("Failed to update project")?;

        Ok(Some(Self::map_model(updated)))
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let res = Projects::delete_by_id(id.to_string())
            .exec(&self.conn)
            .await
            .context("Failed to delete project")?;

        Ok(res.rows_affected > 0)
    }
}
