//! Content discovery.
//!
//! Walks the content directory recursively and yields every markdown file.
//! The walk is lazy and single-pass; calling [`list_content`] again restarts
//! it. Yield order is whatever the filesystem returns, which differs across
//! platforms, so nothing downstream relies on it for correctness.
//!
//! A content directory that does not exist is treated as empty.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Extension of content files.
pub const CONTENT_EXTENSION: &str = "md";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to walk content directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Lazy iterator over the content files under a root.
pub struct ContentFiles {
    walker: Option<walkdir::IntoIter>,
}

impl Iterator for ContentFiles {
    type Item = Result<PathBuf, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        let walker = self.walker.as_mut()?;
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_content(entry.path()) => {
                    return Some(Ok(entry.into_path()));
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }
}

/// Enumerate all content files under `root`, recursively.
pub fn list_content(root: &Path) -> ContentFiles {
    let walker = root
        .is_dir()
        .then(|| WalkDir::new(root).follow_links(true).into_iter());
    ContentFiles { walker }
}

/// Manifest key for a content file: its path relative to the content root,
/// always `/`-separated so the manifest is portable.
pub fn source_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_content(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(CONTENT_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    fn keys(root: &Path) -> BTreeSet<String> {
        list_content(root)
            .map(|p| source_key(root, &p.unwrap()))
            .collect()
    }

    #[test]
    fn finds_markdown_recursively() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("2024/jan")).unwrap();
        fs::write(tmp.path().join("top.md"), "x").unwrap();
        fs::write(tmp.path().join("2024/jan/deep.md"), "x").unwrap();

        let found = keys(tmp.path());
        assert_eq!(
            found,
            BTreeSet::from(["top.md".to_string(), "2024/jan/deep.md".to_string()])
        );
    }

    #[test]
    fn ignores_other_extensions_and_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("notes.md")).unwrap();
        fs::write(tmp.path().join("post.md"), "x").unwrap();
        fs::write(tmp.path().join("image.png"), "x").unwrap();
        fs::write(tmp.path().join("draft.markdown"), "x").unwrap();
        fs::write(tmp.path().join("README"), "x").unwrap();

        assert_eq!(keys(tmp.path()), BTreeSet::from(["post.md".to_string()]));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("LOUD.MD"), "x").unwrap();
        assert_eq!(keys(tmp.path()).len(), 1);
    }

    #[test]
    fn missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(list_content(&tmp.path().join("nope")).count(), 0);
    }

    #[test]
    fn empty_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(list_content(tmp.path()).count(), 0);
    }

    #[test]
    fn listing_is_restartable() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "x").unwrap();
        fs::write(tmp.path().join("b.md"), "x").unwrap();
        assert_eq!(keys(tmp.path()), keys(tmp.path()));
    }

    #[test]
    fn source_key_uses_forward_slashes() {
        let root = Path::new("/site/content");
        let path = root.join("2024").join("post.md");
        assert_eq!(source_key(root, &path), "2024/post.md");
    }
}
