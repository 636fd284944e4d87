//! # Lucius
//!
//! An incremental static blog generator. Markdown posts with a small
//! `key: value` header are rendered through user templates into a static
//! site, and a JSON manifest of every built post lets later runs render only
//! what is new.
//!
//! # Architecture: One Builder, Two Modes
//!
//! ```text
//! content/**/*.md ──scan──▶ parse + validate ──render──▶ docs/blog/<slug>.html
//!                                  │
//!                                  ▼
//!                             posts.db (manifest)
//!                                  │
//!                                  ▼
//!                 docs/index.html, docs/blog/category/<slug>.html
//! ```
//!
//! - **Full rebuild** ([`site::Builder::generate_all`]) clears the output
//!   directory, starts from an empty manifest and renders every post.
//! - **Incremental update** ([`site::Builder::update`]) loads the manifest
//!   and renders only posts whose source path is not yet in it.
//!
//! Both modes regenerate the index and every category page from the whole
//! manifest, copy template and post assets, and save the manifest last. A
//! build that fails part way never leaves a manifest on disk that disagrees
//! with what the previous successful build recorded.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `config.toml` loading, validation, stock defaults, resolved [`config::SiteContext`] |
//! | [`types`] | Post metadata and category links shared by the pipeline and templates |
//! | [`naming`] | Title → URL slug |
//! | [`manifest`] | The persisted build manifest (`posts.db`) |
//! | [`scan`] | Recursive discovery of `*.md` content files |
//! | [`markup`] | Header extraction and markdown → HTML |
//! | [`post`] | Per-post parsing and validation |
//! | [`render`] | Named-template rendering with minijinja |
//! | [`assets`] | Verbatim copies of template and post asset directories |
//! | [`site`] | The builder: full and incremental builds, build events |
//! | [`output`] | CLI output formatting |
//! | [`watch`] | Debounced file watching with automatic rebuilds |
//! | [`serve`] | Local preview server |
//!
//! # Design Decisions
//!
//! ## Presence-Based Staleness
//!
//! An incremental update decides what to build by manifest membership
//! alone. Editing a post that was already built does nothing until the next
//! full rebuild. This keeps `update` trivially cheap and predictable; `build`
//! is always available when edits need to show up.
//!
//! ## Templates on Disk
//!
//! Pages are rendered from Jinja-style templates in the project's own
//! `templates/` directory, so a blog's look lives with its content and can
//! be changed without rebuilding the tool.
//!
//! ## Deterministic Output
//!
//! The manifest is a sorted JSON object and listings are sorted by date with
//! ties kept in manifest order. Building the same content twice produces
//! byte-identical output.

pub mod assets;
pub mod config;
pub mod manifest;
pub mod markup;
pub mod naming;
pub mod output;
pub mod post;
pub mod render;
pub mod scan;
pub mod serve;
pub mod site;
pub mod types;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
