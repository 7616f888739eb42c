use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Listing is published-only, recency-first
        manager
            .create_index(
                Index::create()
                    .name("idx_projects_published_created_at")
                    .table(Projects::Table)
                    .col(Projects::Published)
                    .col(Projects::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_blog_posts_published_created_at")
                    .table(BlogPosts::Table)
                    .col(BlogPosts::Published)
                    .col(BlogPosts::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_auth_sessions_account_id")
                    .table(AuthSessions::Table)
                    .col(AuthSessions::AccountId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_auth_sessions_account_id")
                    .table(AuthSessions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_blog_posts_published_created_at")
                    .table(BlogPosts::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_projects_published_created_at")
                    .table(Projects::Table)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Published,
    CreatedAt,
}

#[derive(DeriveIden)]
enum BlogPosts {
    Table,
    Published,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AuthSessions {
    Table,
    AccountId,
}
