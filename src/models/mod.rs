pub mod blog_post;
pub mod project;

pub use blog_post::{BlogPost, BlogPostDraft, BlogPostPatch};
pub use project::{Project, ProjectDraft, ProjectPatch};

use chrono::{SecondsFormat, Utc};

/// Current time as fixed-width RFC 3339 (microseconds, `Z`), so stored
/// timestamps order the same lexically and chronologically.
#[must_use]
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Trims entries, drops empties and repeats; first occurrence keeps its place.
#[must_use]
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() || out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            continue;
        }
        out.push(tag.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_tags_keeps_first_occurrence() {
        let tags = normalize_tags(["Rust", " axum ", "rust", "", "SQL", "Axum"]);
        assert_eq!(tags, vec!["Rust", "axum", "SQL"]);
    }

    #[test]
    fn timestamps_are_fixed_width() {
        let a = timestamp_now();
        assert_eq!(a.len(), "2026-01-01T00:00:00.000000Z".len());
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn draft_defaults_match_deserialized_defaults() {
        let post: BlogPostDraft = serde_json::from_str(r#"{"title":"Post A"}"#).unwrap();
        assert_eq!(
            post,
            BlogPostDraft {
                title: "Post A".to_string(),
                ..Default::default()
            }
        );
        assert!(post.published);

        let project: ProjectDraft =
            serde_json::from_str(r#"{"title":"Folio","description":"site"}"#).unwrap();
        assert_eq!(
            project,
            ProjectDraft {
                title: "Folio".to_string(),
                description: "site".to_string(),
                ..Default::default()
            }
        );
        assert!(project.published);
    }
}
