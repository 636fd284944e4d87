//! Post parsing and validation.
//!
//! Turns one content file's text into rendered body HTML plus validated
//! [`PostMetadata`]:
//!
//! 1. Convert the text with [`markup::to_html`], which also extracts the
//!    `key: value` header.
//! 2. Require non-empty `title` and `date`. A post missing either is rejected
//!    with a [`ValidationError`] naming every missing field.
//! 3. Use the header's `slug` if present, otherwise slugify the title. An
//!    explicit slug must be a single path segment: no `/`, `\`, `.` or `..`.
//! 4. Use the header's `category` if present, otherwise the configured
//!    default category. A category with no letters or digits falls back to
//!    the default too, since its page would have no file name.
//! 5. Keep every other header field as pass-through metadata.
//!
//! Validation failures are local to the post: the caller reports them and
//! moves on to the next file.

use crate::config::SiteContext;
use crate::markup;
use crate::naming::slugify;
use crate::types::PostMetadata;
use thiserror::Error;

/// Header fields every post must carry.
pub const REQUIRED_FIELDS: &[&str] = &["title", "date"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required metadata: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid slug `{0}`: must be a single path segment")]
    InvalidSlug(String),
}

/// A post that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPost {
    pub html: String,
    pub metadata: PostMetadata,
}

/// Parse and validate one post's source text.
pub fn parse_item(raw_text: &str, context: &SiteContext) -> Result<ParsedPost, ValidationError> {
    let document = markup::to_html(raw_text, &context.config.markup);
    let mut fields = document.metadata;

    let mut take = |key: &str| {
        fields
            .remove(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let title = take("title");
    let date = take("date");
    let slug = take("slug");
    let category = take("category");

    let (title, date) = match (title, date) {
        (Some(title), Some(date)) => (title, date),
        (title, date) => {
            let missing = [(REQUIRED_FIELDS[0], title), (REQUIRED_FIELDS[1], date)]
                .into_iter()
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| name)
                .collect();
            return Err(ValidationError::Missing(missing));
        }
    };

    let slug = match slug {
        Some(slug) if !is_path_segment(&slug) => return Err(ValidationError::InvalidSlug(slug)),
        Some(slug) => slug,
        None => slugify(&title),
    };
    if slug.is_empty() {
        // A title with nothing to transliterate would write `<blog>/.html`.
        return Err(ValidationError::Missing(vec!["slug"]));
    }
    let category = category
        .filter(|c| !slugify(c).is_empty())
        .unwrap_or_else(|| context.config.default_category.clone());

    Ok(ParsedPost {
        html: document.html,
        metadata: PostMetadata {
            title,
            date,
            slug,
            category,
            extra: fields,
        },
    })
}

/// The slug becomes a file name under the blog directory.
fn is_path_segment(slug: &str) -> bool {
    slug != "." && slug != ".." && !slug.contains(['/', '\\'])
}
