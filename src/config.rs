//! Site configuration module.
//!
//! Handles loading, validating, and resolving the project's `config.toml`.
//! Stock defaults are serialized to a TOML table, the user file is merged on
//! top of it, and the merged table is deserialized back into [`SiteConfig`].
//!
//! ## Config File Location
//!
//! ```text
//! my-blog/
//! ├── config.toml        # Optional, every key has a default
//! ├── posts.db           # Build manifest (generated)
//! ├── content/           # Markdown posts, any depth
//! ├── templates/         # post.html, index.html, category.html, css/, js/, img/
//! └── docs/              # Generated site
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! content_dir = "content"
//! output_dir = "docs"
//! template_dir = "templates"
//! blog_dir = "blog"                  # Posts go to <output>/<blog_dir>/<slug>.html
//! default_category = "Uncategorized"
//! copy_dirs = ["img", "files"]       # Per-post asset directories mirrored to the output root
//! template_assets = ["css", "js", "img"]
//! static_pages = ["about.html"]      # Templates rendered verbatim to the output root
//! domain = "blog.example.com"        # Written to <output>/CNAME
//! manifest = "posts.db"
//! slug_collision = "warn"            # or "error"
//!
//! [site]                             # Free-form, available as `site` in every template
//! title = "My Blog"
//!
//! [markup]
//! metadata = true
//! fenced_code = true
//! strikethrough = true
//! tables = true
//! footnotes = true
//! hard_breaks = true
//! link_target = "_blank"
//!
//! [serve]
//! interface = "127.0.0.1"
//! port = 8000
//! watch = true
//! ```
//!
//! Unknown keys are rejected to catch typos early. The `[site]` table is the
//! one exception: it is passed through to templates untouched.
//!
//! ## Site Context
//!
//! [`SiteContext`] is the resolved, read-only view of the configuration that
//! every pipeline component receives: the config plus absolute paths for each
//! directory. It is built once per build and never mutated.

use crate::naming::slugify;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the config file at the project root.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Directory holding the markdown posts, relative to the project root.
    pub content_dir: String,
    /// Directory the site is generated into. Cleared on every full rebuild.
    pub output_dir: String,
    /// Directory holding the named templates and template-level assets.
    pub template_dir: String,
    /// Sub-path of the output directory that receives post pages.
    pub blog_dir: String,
    /// Category assigned to posts without a `category` field.
    pub default_category: String,
    /// Asset directory names looked up next to each post and mirrored into
    /// the output root.
    pub copy_dirs: Vec<String>,
    /// Template sub-directories copied verbatim into the output root.
    pub template_assets: Vec<String>,
    /// Template names rendered with the site data and written to the output
    /// root under the same name.
    pub static_pages: Vec<String>,
    /// Custom domain written to `<output>/CNAME`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Manifest file, relative to the project root.
    pub manifest: String,
    /// What to do when two posts resolve to the same slug.
    pub slug_collision: SlugCollision,
    /// Free-form data injected into every render as `site`.
    pub site: toml::Table,
    /// Markdown feature switches.
    pub markup: MarkupConfig,
    /// Preview server settings.
    pub serve: ServeConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            content_dir: "content".to_string(),
            output_dir: "docs".to_string(),
            template_dir: "templates".to_string(),
            blog_dir: "blog".to_string(),
            default_category: "Uncategorized".to_string(),
            copy_dirs: vec!["img".to_string(), "files".to_string()],
            template_assets: vec!["css".to_string(), "js".to_string(), "img".to_string()],
            static_pages: Vec::new(),
            domain: None,
            manifest: "posts.db".to_string(),
            slug_collision: SlugCollision::default(),
            site: toml::Table::new(),
            markup: MarkupConfig::default(),
            serve: ServeConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("content_dir", &self.content_dir),
            ("output_dir", &self.output_dir),
            ("template_dir", &self.template_dir),
            ("blog_dir", &self.blog_dir),
            ("default_category", &self.default_category),
            ("manifest", &self.manifest),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        // Everything generated lands inside the output directory, and the
        // output directory itself is deleted on every full rebuild.
        let output = match within_root(&self.output_dir) {
            Some(output) if !output.as_os_str().is_empty() => output,
            _ => {
                return Err(ConfigError::Validation(
                    "output_dir must be a sub-directory of the project root".into(),
                ));
            }
        };
        for (key, value) in [
            ("content_dir", &self.content_dir),
            ("template_dir", &self.template_dir),
            ("manifest", &self.manifest),
        ] {
            if let Some(path) = within_root(value)
                && path.starts_with(&output)
            {
                return Err(ConfigError::Validation(format!(
                    "output_dir must not contain {key}"
                )));
            }
        }
        let output_paths = std::iter::once(("blog_dir", &self.blog_dir))
            .chain(self.static_pages.iter().map(|p| ("static_pages", p)))
            .chain(self.copy_dirs.iter().map(|d| ("copy_dirs", d)))
            .chain(self.template_assets.iter().map(|d| ("template_assets", d)));
        for (key, value) in output_paths {
            if !within_root(value).is_some_and(|p| !p.as_os_str().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "{key} entry `{value}` must stay inside output_dir"
                )));
            }
        }
        if slugify(&self.default_category).is_empty() {
            return Err(ConfigError::Validation(
                "default_category must contain at least one letter or digit".into(),
            ));
        }
        if self.serve.port == 0 {
            return Err(ConfigError::Validation("serve.port must be non-zero".into()));
        }
        if let Some(domain) = &self.domain
            && domain.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "domain must not be empty when set".into(),
            ));
        }
        Ok(())
    }
}

/// Lexically normalize a relative path, or `None` if it is absolute or
/// climbs above its starting directory.
///
/// `"content/.."` normalizes to the empty path, `"../x"` and `"/x"` to `None`.
fn within_root(value: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(value).components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => path.push(part),
            Component::ParentDir => {
                if !path.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(path)
}

/// Policy for two posts resolving to the same output slug.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlugCollision {
    /// Report the collision and keep building; the later post wins the file.
    #[default]
    Warn,
    /// Abort the build before the manifest is saved.
    Error,
}

/// Markdown features enabled during conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkupConfig {
    /// Extract the leading `key: value` block as post metadata.
    pub metadata: bool,
    /// Keep the info string of fenced code blocks (`language-*` class).
    pub fenced_code: bool,
    /// `~~strike~~` support.
    pub strikethrough: bool,
    /// GitHub-style tables.
    pub tables: bool,
    /// `[^1]` footnotes.
    pub footnotes: bool,
    /// Backslash and double-space line endings become `<br />`.
    pub hard_breaks: bool,
    /// When set, absolute `http(s)` links open in this target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            metadata: true,
            fenced_code: true,
            strikethrough: true,
            tables: true,
            footnotes: true,
            hard_breaks: true,
            link_target: None,
        }
    }
}

/// Preview server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    /// Interface to bind.
    pub interface: String,
    /// First port to try; the next few are tried when it is busy.
    pub port: u16,
    /// Rebuild when content, templates or config change.
    pub watch: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: "127.0.0.1".to_string(),
            port: 8000,
            watch: true,
        }
    }
}

// =============================================================================
// Site context
// =============================================================================

/// Resolved, immutable view of the configuration for one project.
#[derive(Debug, Clone)]
pub struct SiteContext {
    pub root: PathBuf,
    pub content_dir: PathBuf,
    pub output_dir: PathBuf,
    pub template_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub config: SiteConfig,
}

impl SiteContext {
    /// Resolve every configured directory against the project root.
    pub fn new(root: &Path, config: SiteConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            content_dir: root.join(&config.content_dir),
            output_dir: root.join(&config.output_dir),
            template_dir: root.join(&config.template_dir),
            manifest_path: root.join(&config.manifest),
            config,
        }
    }

    /// Load `config.toml` from the project root and resolve it.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let config = load_config(root)?;
        Ok(Self::new(root, config))
    }

    /// Blog sub-path as seen from templates (`blog_path`).
    pub fn blog_path(&self) -> &str {
        self.config.blog_dir.trim_matches('/')
    }

    /// Output file for a post slug: `<output>/<blog>/<slug>.html`.
    pub fn post_path(&self, slug: &str) -> PathBuf {
        self.output_dir
            .join(self.blog_path())
            .join(format!("{slug}.html"))
    }

    /// Output file for a category slug: `<output>/<blog>/category/<slug>.html`.
    pub fn category_path(&self, slug: &str) -> PathBuf {
        self.output_dir
            .join(self.blog_path())
            .join("category")
            .join(format!("{slug}.html"))
    }

    /// Path relative to the output root, with `/` separators, for display.
    pub fn output_relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.output_dir)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no config file exists in the directory.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given project root.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(root)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Lucius Configuration
# ====================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Markdown posts, searched recursively for *.md files.
content_dir = "content"

# Generated site. Deleted and recreated by `lucius build`.
output_dir = "docs"

# post.html, index.html, category.html and any static page templates.
template_dir = "templates"

# Posts are written to <output_dir>/<blog_dir>/<slug>.html and category
# listings to <output_dir>/<blog_dir>/category/<slug>.html.
blog_dir = "blog"

# Category for posts without a `category:` field.
default_category = "Uncategorized"

# Directories next to a post that are mirrored into the output root.
copy_dirs = ["img", "files"]

# Template sub-directories copied verbatim into the output root.
template_assets = ["css", "js", "img"]

# Templates rendered with the site data to <output_dir>/<name>.
static_pages = []

# Build manifest, relative to the project root.
manifest = "posts.db"

# "warn" reports posts sharing a slug; "error" aborts the build.
slug_collision = "warn"

# Custom domain, written to <output_dir>/CNAME.
# domain = "blog.example.com"

# ---------------------------------------------------------------------------
# Site data, available as `site` in every template.
# ---------------------------------------------------------------------------
[site]
# title = "My Blog"
# author = "Jane Doe"

# ---------------------------------------------------------------------------
# Markdown features
# ---------------------------------------------------------------------------
[markup]
metadata = true
fenced_code = true
strikethrough = true
tables = true
footnotes = true
hard_breaks = true
# Open absolute links in a new tab.
# link_target = "_blank"

# ---------------------------------------------------------------------------
# Preview server (`lucius serve`)
# ---------------------------------------------------------------------------
[serve]
interface = "127.0.0.1"
port = 8000
watch = true
"##
}
