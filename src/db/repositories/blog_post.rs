use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{blog_posts, prelude::*};
use crate::models::{BlogPost, BlogPostDraft, BlogPostPatch, normalize_tags, timestamp_now};

/// Repository for blog posts
pub struct BlogPostRepository {
    conn: DatabaseConnection,
}

impl BlogPostRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: blog_posts::Model) -> BlogPost {
        BlogPost {
            tags: serde_json::from_str(&m.tags).unwrap_or_default(),
            id: m.id,
            title: m.title,
            excerpt: m.excerpt,
            content: m.content,
            author: m.author,
            author_id: m.author_id,
            image: m.image,
            featured: m.featured,
            published: m.published,
            published_at: m.published_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }

    /// Published posts, newest first; equal timestamps fall back to id order.
    pub async fn list_published(&self) -> Result<Vec<BlogPost>> {
        let rows = BlogPosts::find()
            .filter(blog_posts::Column::Published.eq(true))
            .order_by_desc(blog_posts::Column::CreatedAt)
            .order_by_asc(blog_posts::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list blog posts")?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn get(&self, id: &str) -> Result<Option<BlogPost>> {
        let row = BlogPosts::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query blog post")?;

        Ok(row.map(Self::map_model))
    }

    pub async fn insert(&self, draft: &BlogPostDraft, author_id: Option<&str>) -> Result<BlogPost> {
        let now = timestamp_now();
        let model = blog_posts::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            title: Set(draft.title.trim().to_string()),
            excerpt: Set(draft.excerpt.clone()),
            content: Set(draft.content.clone()),
            author: Set(draft.author.clone()),
            author_id: Set(author_id.map(str::to_string)),
            tags: Set(serde_json::to_string(&normalize_tags(&draft.tags))?),
            image: Set(draft.image.clone()),
            featured: Set(draft.featured),
            published: Set(draft.published),
            published_at: Set(now.clone()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let inserted = model
            .insert(&self.conn)
            .await
            .context("Failed to insert blog post")?;

        Ok(Self::map_model(inserted))
    }

    pub async fn update(&self, id: &str, patch: &BlogPostPatch) -> Result<Option<BlogPost>> {
        let Some(row) = BlogPosts::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query blog post for update")?
        else {
            return Ok(None);
        };

        let was_published = row.published;
        let now = timestamp_now();

        let mut active: blog_posts::ActiveModel = row.into();
        if let Some(title) = &patch.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(excerpt) = &patch.excerpt {
            active.excerpt = Set(excerpt.clone());
        }
        if let Some(content) = &patch.content {
            active.content = Set(content.clone());
        }
        if let Some(author) = &patch.author {
            active.author = Set(author.clone());
        }
        if let Some(tags) = &patch.tags {
            active.tags = Set(serde_json::to_string(&normalize_tags(tags))?);
        }
        if let Some(image) = &patch.image {
            active.image = Set(image.clone());
        }
        if let Some(featured) = patch.featured {
            active.featured = Set(featured);
        }
        if let Some(published) = patch.published {
            active.published = Set(published);
            // Re-publishing a draft stamps a fresh publication date
            if published && !was_published {
                active.published_at = Set(now.clone());
            }
        }
        active.updated_at = Set(now);

        let updated = active
            .update(&self.conn)
            .await
            .context("Failed to update blog post")?;

        Ok(Some(Self::map_model(updated)))
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let res = BlogPosts::delete_by_id(id.to_string())
            .exec(&self.conn)
            .await
            .context("Failed to delete blog post")?;

        Ok(res.rows_affected > 0)
    }
}
