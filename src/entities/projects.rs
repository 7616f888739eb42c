use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    pub description: String,

    /// JSON array of technology names, display order preserved.
    pub technologies: String,

    pub image: String,

    pub github: Option<String>,

    pub demo: Option<String>,

    pub featured: bool,

    pub published: bool,

    /// Identity id of the owner; a plain reference, not a foreign key.
    pub author_id: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
