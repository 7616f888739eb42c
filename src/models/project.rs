use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub image: String,
    pub github: Option<String>,
    pub demo: Option<String>,
    pub featured: bool,
    pub published: bool,
    pub author_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A project as edited in a form. `id` is empty until the first save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDraft {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub demo: Option<String>,
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
impl Default for ProjectDraft {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            technologies: Vec::new(),
            image: String::new(),
            github: None,
            demo: None,
            featured: false,
            published: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub technologies: Option<Vec<String>>,
    pub image: Option<String>,
    pub github: Option<Option<String>>,
    pub demo: Option<Option<String>>,
    pub featured: Option<bool>,
    pub published: Option<bool>,
}

impl From<ProjectDraft> for ProjectPatch {
    fn from(draft: ProjectDraft) -> Self {
        Self {
            title: Some(draft.title),
            description: Some(draft.description),
            technologies: Some(draft.technologies),
            image: Some(draft.image),
            github: Some(draft.github),
            demo: Some(draft.demo),
            featured: Some(draft.featured),
            published: Some(draft.published),
        }
    }
}
