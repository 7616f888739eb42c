//! Project and blog post commands

use crate::config::Config;
use crate::models::{BlogPost, BlogPostDraft, BlogPostPatch, Project, ProjectDraft, ProjectPatch};
use crate::services::{ContentLoader, ContentRecord};

use super::context::{CliContext, confirm};

/// Per-collection bits the generic commands need.
trait Listed: ContentRecord {
    const NOUN: &'static str;

    fn title(&self) -> &str;

    fn summary(&self) -> String;

    fn published_patch(on: bool) -> Self::Patch;

    fn featured_patch(on: bool) -> Self::Patch;

    async fn loader(ctx: &CliContext) -> ContentLoader<Self>;
}

impl Listed for Project {
    const NOUN: &'static str = "project";

    fn title(&self) -> &str {
        &self.title
    }

    fn summary(&self) -> String {
        if self.technologies.is_empty() {
            self.description.clone()
        } else {
            format!("{} [{}]", self.description, self.technologies.join(", "))
        }
    }

    fn published_patch(on: bool) -> ProjectPatch {
        ProjectPatch {
            published: Some(on),
            ..Default::default()
        }
    }

    fn featured_patch(on: bool) -> ProjectPatch {
        ProjectPatch {
            featured: Some(on),
            ..Default::default()
        }
    }

    async fn loader(ctx: &CliContext) -> ContentLoader<Self> {
        ctx.shared.project_loader(&ctx.auth).await
    }
}

impl Listed for BlogPost {
    const NOUN: &'static str = "post";

    fn title(&self) -> &str {
        &self.title
    }

    fn summary(&self) -> String {
        let by = if self.author.is_empty() {
            String::new()
        } else {
            format!("by {} ", self.author)
        };
        format!("{by}on {}", self.published_at.get(..10).unwrap_or(&self.published_at))
    }

    fn published_patch(on: bool) -> BlogPostPatch {
        BlogPostPatch {
            published: Some(on),
            ..Default::default()
        }
    }

    fn featured_patch(on: bool) -> BlogPostPatch {
        BlogPostPatch {
            featured: Some(on),
            ..Default::default()
        }
    }

    async fn loader(ctx: &CliContext) -> ContentLoader<Self> {
        ctx.shared.blog_post_loader(&ctx.auth).await
    }
}

async fn list<R: Listed>(config: &Config) -> anyhow::Result<()> {
    let ctx = CliContext::open(config).await?;
    let result = R::loader(&ctx).await.load().await;

    if let Some(error) = result.error {
        println!("Failed to load {}s: {error}", R::NOUN);
        return Ok(());
    }

    if result.data.is_empty() {
        println!("No published {}s yet.", R::NOUN);
        return Ok(());
    }

    println!("Published {}s ({} total)", R::NOUN, result.data.len());
    println!("{:-<70}", "");
    for item in &result.data {
        println!("• {}", item.title());
        println!("  ID: {} | {}", item.id(), item.summary());
    }

    Ok(())
}

async fn create<R: Listed>(config: &Config, draft: R::Draft) -> anyhow::Result<()> {
    let ctx = CliContext::open(config).await?;
    ctx.require_session()?;

    let loader = R::loader(&ctx).await;
    match loader.save(draft).await {
        Ok(record) => println!("✓ Created {} '{}' (ID: {})", R::NOUN, record.title(), record.id()),
        Err(e) => println!("Failed to create {}: {e}", R::NOUN),
    }

    Ok(())
}

async fn patch<R: Listed>(config: &Config, id: &str, patch: R::Patch, done: &str) -> anyhow::Result<()> {
    let ctx = CliContext::open(config).await?;
    ctx.require_session()?;

    let loader = R::loader(&ctx).await;
    match loader.update(id, &patch).await {
        Ok(record) => println!("✓ {done}: {}", record.title()),
        Err(e) => println!("Failed to update {}: {e}", R::NOUN),
    }

    Ok(())
}

async fn remove<R: Listed>(config: &Config, id: &str, yes: bool) -> anyhow::Result<()> {
    let ctx = CliContext::open(config).await?;
    ctx.require_session()?;

    if !yes && !confirm(&format!("Delete {} {id}?", R::NOUN))? {
        println!("Cancelled.");
        return Ok(());
    }

    let loader = R::loader(&ctx).await;
    match loader.delete(id).await {
        Ok(()) => println!("✓ Deleted {} {id}", R::NOUN),
        Err(e) => println!("Failed to delete {}: {e}", R::NOUN),
    }

    Ok(())
}

fn toggled(flag: &str, on: bool) -> String {
    if on {
        flag.to_string()
    } else {
        format!("Un{}", flag.to_lowercase())
    }
}

pub async fn cmd_projects_list(config: &Config) -> anyhow::Result<()> {
    list::<Project>(config).await
}

pub async fn cmd_projects_add(config: &Config, draft: ProjectDraft) -> anyhow::Result<()> {
    create::<Project>(config, draft).await
}

pub async fn cmd_projects_publish(config: &Config, id: &str, on: bool) -> anyhow::Result<()> {
    patch::<Project>(config, id, Project::published_patch(on), &toggled("Published", on)).await
}

pub async fn cmd_projects_feature(config: &Config, id: &str, on: bool) -> anyhow::Result<()> {
    patch::<Project>(config, id, Project::featured_patch(on), &toggled("Featured", on)).await
}

pub async fn cmd_projects_remove(config: &Config, id: &str, yes: bool) -> anyhow::Result<()> {
    remove::<Project>(config, id, yes).await
}

pub async fn cmd_posts_list(config: &Config) -> anyhow::Result<()> {
    list::<BlogPost>(config).await
}

pub async fn cmd_posts_add(config: &Config, draft: BlogPostDraft) -> anyhow::Result<()> {
    create::<BlogPost>(config, draft).await
}

pub async fn cmd_posts_publish(config: &Config, id: &str, on: bool) -> anyhow::Result<()> {
    patch::<BlogPost>(config, id, BlogPost::published_patch(on), &toggled("Published", on)).await
}

pub async fn cmd_posts_feature(config: &Config, id: &str, on: bool) -> anyhow::Result<()> {
    patch::<BlogPost>(config, id, BlogPost::featured_patch(on), &toggled("Featured", on)).await
}

pub async fn cmd_posts_remove(config: &Config, id: &str, yes: bool) -> anyhow::Result<()> {
    remove::<BlogPost>(config, id, yes).await
}
