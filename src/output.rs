//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Build
//!
//! Every build event becomes one or more lines. Paths on the left are source
//! files relative to the content directory, paths on the right are relative
//! to the output directory.
//!
//! ```text
//! ==> Full rebuild
//! Post hello.md → blog/hello-world.html
//! Skipped drafts/idea.md
//!     Missing: title, date
//! Slug collision: hello-world
//!     again.md overwrites hello.md
//! Assets → css/
//! Page → about.html
//! Index → index.html
//! Category → blog/category/uncategorized.html
//! Domain → CNAME
//! Manifest posts.db (2 posts)
//! ==> Done: 2 rendered, 1 skipped (2 posts, 1 categories)
//! ```
//!
//! ## Check
//!
//! ```text
//! ok   hello.md → hello-world (Uncategorized)
//! FAIL drafts/idea.md
//!     missing required metadata: title, date
//!
//! 1 valid, 1 invalid
//! ```
//!
//! ## Watch / serve
//!
//! Long-running commands prefix each status line with a bracketed tag:
//! `[watch] content/hello.md changed`, `[serve] http://127.0.0.1:8000`.
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::post::ValidationError;
use crate::site::{BuildEvent, BuildMode, CheckedPost, PageKind};

// ============================================================================
// Build output
// ============================================================================

/// Format a single build event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::Started { mode } => {
            let label = match mode {
                BuildMode::Full => "Full rebuild",
                BuildMode::Incremental => "Incremental build",
            };
            vec![format!("==> {label}")]
        }
        BuildEvent::PostRendered { source, output } => {
            vec![format!("Post {source} \u{2192} {output}")]
        }
        BuildEvent::PostSkipped { source, reason } => {
            let detail = match reason {
                ValidationError::Missing(fields) => format!("Missing: {}", fields.join(", ")),
                ValidationError::InvalidSlug(slug) => format!("Invalid slug: {slug}"),
            };
            vec![format!("Skipped {source}"), format!("    {detail}")]
        }
        BuildEvent::SlugCollision {
            slug,
            source,
            existing,
        } => vec![
            format!("Slug collision: {slug}"),
            format!("    {source} overwrites {existing}"),
        ],
        BuildEvent::AssetsCopied { destination } => {
            vec![format!("Assets \u{2192} {destination}/")]
        }
        BuildEvent::PageWritten { kind, output } => {
            let label = match kind {
                PageKind::Static => "Page",
                PageKind::Index => "Index",
                PageKind::Category => "Category",
                PageKind::Domain => "Domain",
            };
            vec![format!("{label} \u{2192} {output}")]
        }
        BuildEvent::ManifestSaved { path, entries } => {
            vec![format!("Manifest {path} ({entries} posts)")]
        }
        BuildEvent::Finished { report } => vec![format!("==> Done: {report}")],
    }
}

pub fn print_build_event(event: &BuildEvent) {
    for line in format_build_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format the result of validating every post.
pub fn format_check_output(checked: &[CheckedPost]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut invalid = 0;

    for post in checked {
        match &post.result {
            Ok(meta) => lines.push(format!(
                "ok   {} \u{2192} {} ({})",
                post.source, meta.slug, meta.category
            )),
            Err(err) => {
                invalid += 1;
                lines.push(format!("FAIL {}", post.source));
                lines.push(format!("    {err}"));
            }
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "{} valid, {} invalid",
        checked.len() - invalid,
        invalid
    ));
    lines
}

pub fn print_check_output(checked: &[CheckedPost]) {
    for line in format_check_output(checked) {
        println!("{}", line);
    }
}

// ============================================================================
// Watch / serve
// ============================================================================

/// One tagged status line for long-running commands.
pub fn status_line(tag: &str, message: impl std::fmt::Display) -> String {
    format!("[{tag}] {message}")
}

// ============================================================================
// Tests
// ============================================================================
