//! Template rendering.
//!
//! Pages are rendered from named templates in the project's template
//! directory with [minijinja](https://docs.rs/minijinja). The environment is
//! built once per build, so edits to templates are picked up by the next
//! build without restarting a watching process.
//!
//! ## Templates
//!
//! | Name | Context |
//! |------|---------|
//! | `post.html` | `site`, `post`, `content`, `blog_path` |
//! | `index.html` | `site`, `posts`, `categories`, `blog_path` |
//! | `category.html` | `site`, `category`, `category_slug`, `posts`, `categories`, `blog_path` |
//! | static pages | `site`, `posts`, `categories`, `blog_path` |
//!
//! `content` is the post body HTML and is marked safe, so `{{ content }}`
//! emits it unescaped. Every other value is auto-escaped in `.html`
//! templates. A `slugify` filter is registered for linking category pages:
//! `{{ blog_path }}/category/{{ post.category|slugify }}.html`.
//!
//! Whitespace control follows the usual static-site setup: `trim_blocks`
//! and `lstrip_blocks` are both on.
//!
//! Any failure (missing template, syntax error, undefined filter) is a
//! [`RenderError`]. Builds treat it as fatal, since a broken template breaks
//! every page that uses it.

use crate::naming::slugify;
use minijinja::{Environment, path_loader};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

pub const POST_TEMPLATE: &str = "post.html";
pub const INDEX_TEMPLATE: &str = "index.html";
pub const CATEGORY_TEMPLATE: &str = "category.html";

#[derive(Error, Debug)]
#[error("Template {name} failed: {source:#}")]
pub struct RenderError {
    pub name: String,
    #[source]
    pub source: minijinja::Error,
}

/// Named-template renderer over one template directory.
#[derive(Debug)]
pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new(template_dir: &Path) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(template_dir.to_path_buf()));
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_filter("slugify", |value: String| slugify(&value));
        Self { env }
    }

    /// Load and compile each named template without rendering anything.
    pub fn preflight<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<(), RenderError> {
        for name in names {
            self.env.get_template(name).map_err(|source| RenderError {
                name: name.to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Render a named template with a serializable context.
    pub fn render<S: Serialize>(&self, name: &str, context: S) -> Result<String, RenderError> {
        let err = |source| RenderError {
            name: name.to_string(),
            source,
        };
        let template = self.env.get_template(name).map_err(err)?;
        template.render(context).map_err(err)
    }
}
