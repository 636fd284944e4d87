//! Shared test utilities for the lucius test suite.
//!
//! [`TestProject`] is a throwaway project root in a temp directory with a
//! minimal set of templates, plus helpers to write posts and read back what
//! a build produced.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let project = TestProject::new();
//! project.post("hello.md", "Hello", "2024-01-15", &[("category", "Rust")]);
//! project.builder().generate_all().unwrap();
//!
//! assert!(project.output_exists("blog/hello.html"));
//! assert_eq!(project.index_titles(), vec!["Hello"]);
//! ```
//!
//! The stock templates are deliberately plain so assertions can match on
//! their output:
//!
//! - `post.html` renders `<h1>{title}</h1>` followed by the body.
//! - `index.html` renders one `title|date` line per post.
//! - `category.html` renders `{category}:` followed by one title per line.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::SiteContext;
use crate::manifest::Manifest;
use crate::site::Builder;

pub const POST_TEMPLATE_BODY: &str = "<h1>{{ post.title }}</h1>\n{{ content }}";
pub const INDEX_TEMPLATE_BODY: &str = "{% for p in posts %}\n{{ p.title }}|{{ p.date }}\n{% endfor %}\n";
pub const CATEGORY_TEMPLATE_BODY: &str =
    "{{ category }}:\n{% for p in posts %}\n{{ p.title }}\n{% endfor %}\n";

const BASE_CONFIG: &str = "[site]\ntitle = \"Test Blog\"\n";

/// A project root with templates and an empty content directory.
pub struct TestProject {
    tmp: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self::with_config("")
    }

    /// Top-level config keys in `extra` go before the `[site]` table.
    pub fn with_config(extra: &str) -> Self {
        let project = Self {
            tmp: TempDir::new().unwrap(),
        };
        project.write("config.toml", &format!("{extra}{BASE_CONFIG}"));
        project.template("post.html", POST_TEMPLATE_BODY);
        project.template("index.html", INDEX_TEMPLATE_BODY);
        project.template("category.html", CATEGORY_TEMPLATE_BODY);
        fs::create_dir_all(project.root().join("content")).unwrap();
        project
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn context(&self) -> SiteContext {
        SiteContext::load(self.root()).unwrap()
    }

    pub fn builder(&self) -> Builder {
        Builder::new(self.context())
    }

    /// Write a file relative to the project root.
    pub fn write(&self, rel: &str, body: &str) {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    pub fn template(&self, name: &str, body: &str) {
        self.write(&format!("templates/{name}"), body);
    }

    /// Write a content file verbatim.
    pub fn raw(&self, rel: &str, body: &str) {
        self.write(&format!("content/{rel}"), body);
    }

    /// Write a valid post with `title`, `date` and any extra header fields.
    pub fn post(&self, rel: &str, title: &str, date: &str, fields: &[(&str, &str)]) {
        let mut body = format!("title: {title}\ndate: {date}\n");
        for (key, value) in fields {
            body.push_str(&format!("{key}: {value}\n"));
        }
        body.push_str("\nBody of ");
        body.push_str(title);
        body.push('\n');
        self.raw(rel, &body);
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.root().join("content").join(rel)).unwrap();
    }

    pub fn write_output(&self, rel: &str, body: &str) {
        self.write(&format!("docs/{rel}"), body);
    }

    pub fn output_path(&self, rel: &str) -> PathBuf {
        self.root().join("docs").join(rel)
    }

    pub fn output_exists(&self, rel: &str) -> bool {
        self.output_path(rel).exists()
    }

    /// Read an output file. Panics if missing.
    pub fn output(&self, rel: &str) -> String {
        let path = self.output_path(rel);
        fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
    }

    /// Post titles in `index.html` order.
    pub fn index_titles(&self) -> Vec<String> {
        self.output("index.html")
            .lines()
            .filter_map(|line| line.split_once('|'))
            .map(|(title, _)| title.to_string())
            .collect()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root().join("posts.db")
    }

    pub fn manifest(&self) -> Manifest {
        Manifest::load(&self.manifest_path()).unwrap()
    }

    pub fn manifest_text(&self) -> String {
        fs::read_to_string(self.manifest_path()).unwrap()
    }

    pub fn write_manifest(&self, body: &str) {
        fs::write(self.manifest_path(), body).unwrap();
    }

    /// Every file under the output directory with its contents, sorted by path.
    pub fn output_snapshot(&self) -> Vec<(String, Vec<u8>)> {
        let root = self.root().join("docs");
        let mut files: Vec<(String, Vec<u8>)> = walkdir::WalkDir::new(&root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(&root).unwrap();
                (rel.to_string_lossy().replace('\\', "/"), fs::read(e.path()).unwrap())
            })
            .collect();
        files.sort();
        files
    }
}
