//! Build manifest for incremental builds.
//!
//! The manifest records every post that has been built: a mapping from the
//! post's source path (relative to the content directory, `/`-separated) to
//! its [`PostMetadata`]. It is the only record of "already built" that
//! [`update`](crate::site::Builder::update) consults, and the only input the
//! index and category pages are generated from.
//!
//! # Lifecycle
//!
//! - Loaded in full at the start of an incremental build. A missing file is an
//!   empty manifest; a file that exists but does not parse is
//!   [`ManifestError::Corrupt`] and aborts the build, so existing data is
//!   never silently discarded.
//! - Mutated in memory once per successfully rendered post. Posts that fail
//!   validation never enter it.
//! - Rewritten in full (not merged) at the end of a build. The write goes to
//!   a sibling temp file that is then renamed over the old one, so a crash
//!   mid-write leaves the previous manifest intact.
//!
//! # Format
//!
//! A single JSON object, keys sorted, one metadata object per post:
//!
//! ```json
//! {
//!   "2024/hello.md": {
//!     "title": "Hello, World!",
//!     "date": "2024-01-15",
//!     "slug": "hello-world",
//!     "category": "Uncategorized",
//!     "author": "Ana"
//!   }
//! }
//! ```
//!
//! Entries are kept in a `BTreeMap`, so the same manifest always serializes to
//! the same bytes.

use crate::naming::slugify;
use crate::types::{CategoryLink, PostMetadata, sort_by_date_desc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error on manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Corrupt manifest {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persisted mapping from source path to post metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, PostMetadata>,
}

impl Manifest {
    /// Create an empty manifest (first build, or full rebuild).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from disk. A missing file yields an empty manifest.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::empty()),
            Err(source) => {
                return Err(ManifestError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|source| ManifestError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replace the file on disk with this manifest.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let io_err = |source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(io::Error::from).map_err(io_err)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = temp_path(path);
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)
    }

    pub fn contains(&self, source_path: &str) -> bool {
        self.entries.contains_key(source_path)
    }

    pub fn get(&self, source_path: &str) -> Option<&PostMetadata> {
        self.entries.get(source_path)
    }

    /// Record a built post, returning the entry it replaced, if any.
    pub fn insert(&mut self, source_path: String, metadata: PostMetadata) -> Option<PostMetadata> {
        self.entries.insert(source_path, metadata)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in source path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PostMetadata)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Source path of the entry that owns `slug`, if any.
    pub fn slug_owner(&self, slug: &str) -> Option<&str> {
        self.iter()
            .find(|(_, meta)| meta.slug == slug)
            .map(|(source, _)| source)
    }

    /// All posts, newest first.
    pub fn posts_by_date(&self) -> Vec<&PostMetadata> {
        let mut posts: Vec<&PostMetadata> = self.entries.values().collect();
        sort_by_date_desc(&mut posts);
        posts
    }

    /// Posts grouped by category slug, each group newest first.
    ///
    /// Names that slugify alike (`Rust`, `rust`) share one group, and so one
    /// page. Categories with an empty slug are left out; parsed posts never
    /// carry one.
    pub fn categories(&self) -> BTreeMap<String, CategoryGroup<'_>> {
        let mut groups: BTreeMap<String, Vec<&PostMetadata>> = BTreeMap::new();
        for meta in self.entries.values() {
            let slug = slugify(&meta.category);
            if !slug.is_empty() {
                groups.entry(slug).or_default().push(meta);
            }
        }
        groups
            .into_iter()
            .filter_map(|(slug, mut posts)| {
                sort_by_date_desc(&mut posts);
                let newest: &PostMetadata = posts.first().copied()?;
                let name = newest.category.as_str();
                Some((slug, CategoryGroup { name, posts }))
            })
            .collect()
    }

    /// One link per category page, in slug order.
    pub fn category_links(&self) -> Vec<CategoryLink> {
        self.categories()
            .into_iter()
            .map(|(slug, group)| CategoryLink {
                name: group.name.to_string(),
                slug,
                count: group.posts.len(),
            })
            .collect()
    }
}

/// Posts sharing one category page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup<'a> {
    /// The category as written by the group's newest post.
    pub name: &'a str,
    /// Newest first.
    pub posts: Vec<&'a PostMetadata>,
}

/// `posts.db` → `posts.db.tmp`, in the same directory so rename is atomic.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
