//! Site building: full and incremental builds.
//!
//! [`Builder`] drives one build at a time through the same sequence of steps
//! for both modes:
//!
//! ```text
//! preflight templates
//!   → Full: clear output, start from an empty manifest
//!   → Incremental: load the manifest from disk
//! for each content file
//!   → skip if Incremental and already in the manifest
//!   → parse + validate (failures are reported and skipped)
//!   → render post.html, record in manifest, copy post assets
//! copy template assets
//! render static pages, index.html, one category page per category
//! write CNAME
//! save manifest
//! ```
//!
//! ## Incremental builds
//!
//! An incremental build only renders posts whose source path is not yet a
//! manifest key. Posts that were built before are never re-parsed, even when
//! their source changed on disk; a full rebuild picks those up. The index
//! and category pages are always regenerated from the whole manifest, so
//! they stay consistent with it either way.
//!
//! ## Failure handling
//!
//! - A post missing `title` or `date`, or with a slug that is not a plain
//!   file name, is reported with [`BuildEvent::PostSkipped`] and left out of
//!   the output and the manifest.
//!   The build carries on.
//! - A corrupt manifest, a template error, an IO error or an asset copy
//!   failure aborts the build. The manifest on disk is left as it was; pages
//!   already written in this run stay written.
//! - Two posts sharing a slug are reported with [`BuildEvent::SlugCollision`].
//!   With `slug_collision = "error"` the collision aborts the build instead.
//!
//! ## Progress
//!
//! Progress is reported as [`BuildEvent`]s over an optional channel. The
//! builder itself never prints; see [`output`](crate::output) for formatting.

use crate::assets::{self, AssetError};
use crate::config::{SiteContext, SlugCollision};
use crate::manifest::{Manifest, ManifestError};
use crate::post::{self, ValidationError};
use crate::render::{CATEGORY_TEMPLATE, INDEX_TEMPLATE, POST_TEMPLATE, RenderError, Renderer};
use crate::scan::{self, ScanError};
use crate::types::PostMetadata;
use minijinja::{Value, context};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Name of the custom-domain marker file in the output root.
pub const DOMAIN_FILENAME: &str = "CNAME";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Template(#[from] RenderError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Slug collision: {post} and {existing} both resolve to `{slug}`")]
    SlugCollision {
        slug: String,
        post: String,
        existing: String,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> BuildError + '_ {
    move |source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Clear the output and rebuild every post.
    Full,
    /// Build only posts missing from the manifest.
    Incremental,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Full => write!(f, "full rebuild"),
            BuildMode::Incremental => write!(f, "incremental build"),
        }
    }
}

/// Which kind of non-post page was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Static,
    Index,
    Category,
    Domain,
}

/// Progress of a build, in the order it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    Started {
        mode: BuildMode,
    },
    PostRendered {
        source: String,
        output: String,
    },
    PostSkipped {
        source: String,
        reason: ValidationError,
    },
    SlugCollision {
        slug: String,
        source: String,
        existing: String,
    },
    AssetsCopied {
        destination: String,
    },
    PageWritten {
        kind: PageKind,
        output: String,
    },
    ManifestSaved {
        path: String,
        entries: usize,
    },
    Finished {
        report: BuildReport,
    },
}

/// Summary of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub mode: BuildMode,
    /// Posts rendered in this run.
    pub rendered: usize,
    /// Posts rejected by validation in this run.
    pub skipped: usize,
    /// Slug collisions detected in this run.
    pub collisions: usize,
    /// Posts in the saved manifest.
    pub posts: usize,
    /// Category pages written.
    pub categories: usize,
}

impl BuildReport {
    fn new(mode: BuildMode) -> Self {
        Self {
            mode,
            rendered: 0,
            skipped: 0,
            collisions: 0,
            posts: 0,
            categories: 0,
        }
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rendered", self.rendered)?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if self.collisions > 0 {
            write!(f, ", {} slug collisions", self.collisions)?;
        }
        write!(f, " ({} posts, {} categories)", self.posts, self.categories)
    }
}

/// Result of validating one post without building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedPost {
    pub source: String,
    pub result: Result<PostMetadata, ValidationError>,
}

/// Drives full and incremental builds for one site.
pub struct Builder {
    context: SiteContext,
    events: Option<Sender<BuildEvent>>,
}

impl Builder {
    pub fn new(context: SiteContext) -> Self {
        Self {
            context,
            events: None,
        }
    }

    /// Report progress on `events`. Sends never block; a dropped receiver is
    /// ignored.
    pub fn with_events(mut self, events: Sender<BuildEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn context(&self) -> &SiteContext {
        &self.context
    }

    /// Full rebuild: clear the output directory and build every post.
    pub fn generate_all(&self) -> Result<BuildReport, BuildError> {
        self.build(BuildMode::Full)
    }

    /// Incremental build: build only posts not yet in the manifest, then
    /// regenerate every listing page.
    pub fn update(&self) -> Result<BuildReport, BuildError> {
        self.build(BuildMode::Incremental)
    }

    /// Parse and validate every post without writing anything.
    pub fn check(&self) -> Result<Vec<CheckedPost>, BuildError> {
        let ctx = &self.context;
        let mut checked = Vec::new();
        for path in scan::list_content(&ctx.content_dir) {
            let path = path?;
            let raw = fs::read_to_string(&path).map_err(io_error(&path))?;
            checked.push(CheckedPost {
                source: scan::source_key(&ctx.content_dir, &path),
                result: post::parse_item(&raw, ctx).map(|p| p.metadata),
            });
        }
        checked.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(checked)
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn build(&self, mode: BuildMode) -> Result<BuildReport, BuildError> {
        let ctx = &self.context;
        self.emit(BuildEvent::Started { mode });

        let renderer = Renderer::new(&ctx.template_dir);
        renderer.preflight(
            [POST_TEMPLATE, INDEX_TEMPLATE, CATEGORY_TEMPLATE]
                .into_iter()
                .chain(ctx.config.static_pages.iter().map(String::as_str)),
        )?;

        let mut manifest = match mode {
            BuildMode::Full => {
                clear_output(&ctx.output_dir)?;
                Manifest::empty()
            }
            BuildMode::Incremental => Manifest::load(&ctx.manifest_path)?,
        };
        fs::create_dir_all(&ctx.output_dir).map_err(io_error(&ctx.output_dir))?;

        let mut report = BuildReport::new(mode);
        for path in scan::list_content(&ctx.content_dir) {
            let path = path?;
            let source = scan::source_key(&ctx.content_dir, &path);
            if mode == BuildMode::Incremental && manifest.contains(&source) {
                continue;
            }
            self.build_post(&renderer, &mut manifest, &path, source, &mut report)?;
        }

        for destination in assets::copy_template_assets(
            &ctx.template_dir,
            &ctx.output_dir,
            &ctx.config.template_assets,
        )? {
            self.emit(BuildEvent::AssetsCopied {
                destination: ctx.output_relative(&destination),
            });
        }

        self.write_static_pages(&renderer, &manifest)?;
        self.write_index(&renderer, &manifest)?;
        report.categories = self.write_categories(&renderer, &manifest)?;
        self.write_domain()?;

        manifest.save(&ctx.manifest_path)?;
        report.posts = manifest.len();
        self.emit(BuildEvent::ManifestSaved {
            path: ctx.config.manifest.clone(),
            entries: manifest.len(),
        });
        self.emit(BuildEvent::Finished {
            report: report.clone(),
        });
        Ok(report)
    }

    fn build_post(
        &self,
        renderer: &Renderer,
        manifest: &mut Manifest,
        path: &Path,
        source: String,
        report: &mut BuildReport,
    ) -> Result<(), BuildError> {
        let ctx = &self.context;
        let raw = fs::read_to_string(path).map_err(io_error(path))?;

        let parsed = match post::parse_item(&raw, ctx) {
            Ok(parsed) => parsed,
            Err(reason) => {
                report.skipped += 1;
                self.emit(BuildEvent::PostSkipped { source, reason });
                return Ok(());
            }
        };
        let meta = parsed.metadata;

        if let Some(existing) = manifest.slug_owner(&meta.slug)
            && existing != source
        {
            if ctx.config.slug_collision == SlugCollision::Error {
                return Err(BuildError::SlugCollision {
                    slug: meta.slug,
                    post: source,
                    existing: existing.to_string(),
                });
            }
            report.collisions += 1;
            self.emit(BuildEvent::SlugCollision {
                slug: meta.slug.clone(),
                source: source.clone(),
                existing: existing.to_string(),
            });
        }

        let html = renderer.render(
            POST_TEMPLATE,
            context! {
                site => &ctx.config.site,
                post => &meta,
                content => Value::from_safe_string(parsed.html),
                blog_path => ctx.blog_path(),
            },
        )?;
        let output = ctx.post_path(&meta.slug);
        write_page(&output, &html)?;
        manifest.insert(source.clone(), meta);
        report.rendered += 1;
        self.emit(BuildEvent::PostRendered {
            source,
            output: ctx.output_relative(&output),
        });

        if let Some(post_dir) = path.parent() {
            for destination in
                assets::copy_post_assets(post_dir, &ctx.output_dir, &ctx.config.copy_dirs)?
            {
                self.emit(BuildEvent::AssetsCopied {
                    destination: ctx.output_relative(&destination),
                });
            }
        }
        Ok(())
    }

    fn write_static_pages(&self, renderer: &Renderer, manifest: &Manifest) -> Result<(), BuildError> {
        let ctx = &self.context;
        for name in &ctx.config.static_pages {
            let html = renderer.render(
                name,
                context! {
                    site => &ctx.config.site,
                    posts => manifest.posts_by_date(),
                    categories => manifest.category_links(),
                    blog_path => ctx.blog_path(),
                },
            )?;
            let output = ctx.output_dir.join(name);
            write_page(&output, &html)?;
            self.emit(BuildEvent::PageWritten {
                kind: PageKind::Static,
                output: ctx.output_relative(&output),
            });
        }
        Ok(())
    }

    fn write_index(&self, renderer: &Renderer, manifest: &Manifest) -> Result<(), BuildError> {
        let ctx = &self.context;
        let html = renderer.render(
            INDEX_TEMPLATE,
            context! {
                site => &ctx.config.site,
                posts => manifest.posts_by_date(),
                categories => manifest.category_links(),
                blog_path => ctx.blog_path(),
            },
        )?;
        let output = ctx.output_dir.join(INDEX_TEMPLATE);
        write_page(&output, &html)?;
        self.emit(BuildEvent::PageWritten {
            kind: PageKind::Index,
            output: ctx.output_relative(&output),
        });
        Ok(())
    }

    /// One page per category slug. Returns the number written.
    fn write_categories(&self, renderer: &Renderer, manifest: &Manifest) -> Result<usize, BuildError> {
        let ctx = &self.context;
        let links = manifest.category_links();
        let categories = manifest.categories();
        for (slug, group) in &categories {
            let html = renderer.render(
                CATEGORY_TEMPLATE,
                context! {
                    site => &ctx.config.site,
                    category => group.name,
                    category_slug => slug,
                    posts => &group.posts,
                    categories => &links,
                    blog_path => ctx.blog_path(),
                },
            )?;
            let output = ctx.category_path(slug);
            write_page(&output, &html)?;
            self.emit(BuildEvent::PageWritten {
                kind: PageKind::Category,
                output: ctx.output_relative(&output),
            });
        }
        Ok(categories.len())
    }

    fn write_domain(&self) -> Result<(), BuildError> {
        let ctx = &self.context;
        if let Some(domain) = &ctx.config.domain {
            let output = ctx.output_dir.join(DOMAIN_FILENAME);
            write_page(&output, domain.trim())?;
            self.emit(BuildEvent::PageWritten {
                kind: PageKind::Domain,
                output: ctx.output_relative(&output),
            });
        }
        Ok(())
    }
}

fn clear_output(output_dir: &Path) -> Result<(), BuildError> {
    if output_dir.exists() {
        fs::remove_dir_all(output_dir).map_err(io_error(output_dir))?;
    }
    Ok(())
}

fn write_page(path: &Path, contents: &str) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    fs::write(path, contents).map_err(io_error(path))
}
