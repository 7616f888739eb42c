use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub author: String,
    pub author_id: Option<String>,
    pub tags: Vec<String>,
    pub image: Option<String>,
    pub featured: bool,
    pub published: bool,
    pub published_at: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A post as edited in a form. `id` is empty until the first save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPostDraft {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_true")]
    pub published: bool,
}

const fn default_true() -> bool {
    true
}

/// New entries are published unless the form says otherwise, matching
/// what an omitted `published` field deserializes to.
impl Default for BlogPostDraft {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            excerpt: String::new(),
            content: String::new(),
            author: String::new(),
            tags: Vec::new(),
            image: None,
            featured: false,
            published: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPostPatch {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
    pub image: Option<Option<String>>,
    pub featured: Option<bool>,
    pub published: Option<bool>,
}

impl From<BlogPostDraft> for BlogPostPatch {
    fn from(draft: BlogPostDraft) -> Self {
        Self {
            title: Some(draft.title),
            excerpt: Some(draft.excerpt),
            content: Some(draft.content),
            author: Some(draft.author),
            tags: Some(draft.tags),
            image: Some(draft.image),
            featured: Some(draft.featured),
            published: Some(draft.published),
        }
    }
}
