//! Shared types used across pipeline stages.
//!
//! [`PostMetadata`] is what the parser produces, what the manifest persists,
//! and what the index and category templates iterate over, so its serialized
//! shape is the manifest's on-disk format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata of one successfully parsed post.
///
/// The four known fields are always present once a post has passed
/// validation. Every other `key: value` line from the post header is kept
/// verbatim in `extra` and serialized alongside them, so templates see
/// `post.author` the same way they see `post.title`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetadata {
    pub title: String,
    /// Lexically sortable date, ISO-8601 recommended.
    pub date: String,
    pub slug: String,
    pub category: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// One category as listed in index and category templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryLink {
    pub name: String,
    pub slug: String,
    pub count: usize,
}

/// Sort posts newest first by `date` string comparison.
///
/// The sort is stable, so posts sharing a date keep their incoming order.
pub fn sort_by_date_desc(posts: &mut [&PostMetadata]) {
    posts.sort_by(|a, b| b.date.cmp(&a.date));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, date: &str) -> PostMetadata {
        PostMetadata {
            title: title.to_string(),
            date: date.to_string(),
            slug: title.to_lowercase(),
            category: "General".to_string(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn extra_fields_flatten_into_the_object() {
        let mut p = post("Hello", "2024-01-01");
        p.extra.insert("author".into(), "Ana".into());
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["title"], "Hello");
        assert_eq!(json["author"], "Ana");
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn unknown_keys_land_in_extra_on_deserialize() {
        let json = r#"{"title":"T","date":"2024-01-01","slug":"t","category":"c","tags":"a, b"}"#;
        let p: PostMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(p.extra.get("tags").map(String::as_str), Some("a, b"));
        assert_eq!(p.extra.len(), 1);
    }

    #[test]
    fn missing_known_field_fails_to_deserialize() {
        let json = r#"{"title":"T","date":"2024-01-01","slug":"t"}"#;
        assert!(serde_json::from_str::<PostMetadata>(json).is_err());
    }

    #[test]
    fn sort_is_newest_first() {
        let a = post("A", "2023-05-01");
        let b = post("B", "2024-01-15");
        let c = post("C", "2023-12-31");
        let mut posts = vec![&a, &b, &c];
        sort_by_date_desc(&mut posts);
        let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C", "A"]);
    }
}
