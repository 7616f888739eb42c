use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "blog_posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    pub excerpt: String,

    pub content: String,

    /// Display name of the author.
    pub author: String,

    /// Identity id of the owner; a plain reference, not a foreign key.
    pub author_id: Option<String>,

    /// JSON array of tags, display order preserved.
    pub tags: String,

    pub image: Option<String>,

    pub featured: bool,

    pub published: bool,

    pub published_at: String,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
