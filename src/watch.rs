//! File watching and automatic rebuilds.
//!
//! Watches the content directory, the template directory and `config.toml`,
//! and rebuilds the site after changes settle. The project root is watched
//! without recursion so a `config.toml` created after startup is still seen;
//! other files at the root are ignored.
//!
//! ```text
//! notify events → filter → Debouncer (300ms) → rebuild
//! ```
//!
//! - Editor artifacts (`*.swp`, `*~`, dotfiles) are ignored.
//! - Anything under the output directory and the manifest file are ignored,
//!   so a build never triggers itself.
//! - Each rebuild reloads `config.toml` and constructs a fresh builder, so
//!   config and template edits take effect without a restart. Watched
//!   directories are fixed at startup: pointing `content_dir` elsewhere
//!   needs a restart.
//! - A failed rebuild is logged and the loop keeps going. The next change
//!   tries again.
//!
//! The loop runs until the shutdown flag is set or the watcher goes away.

use crate::config::{CONFIG_FILENAME, ConfigError, SiteContext};
use crate::output::status_line;
use crate::site::{BuildError, BuildEvent, BuildMode, Builder};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use thiserror::Error;

const DEBOUNCE_MS: u64 = 300;
/// How often an idle loop checks the shutdown flag.
const IDLE_POLL_MS: u64 = 500;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to create file watcher: {0}")]
    Init(#[source] notify::Error),
    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
enum RebuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

/// Which changed paths can affect a build.
///
/// Sources are the content and template trees plus the config file. Paths a
/// build writes to never trigger a rebuild, even when they sit inside a
/// source tree.
struct WatchScope {
    sources: Vec<PathBuf>,
    config_path: PathBuf,
    output_dir: PathBuf,
    manifest_path: PathBuf,
}

impl WatchScope {
    fn new(root: &Path, context: &SiteContext) -> Self {
        Self {
            sources: vec![context.content_dir.clone(), context.template_dir.clone()],
            config_path: root.join(CONFIG_FILENAME),
            output_dir: context.output_dir.clone(),
            manifest_path: context.manifest_path.clone(),
        }
    }

    /// Manifest saves go through `<manifest>.tmp`, which [`is_temp_file`]
    /// already covers.
    fn ignores(&self, path: &Path) -> bool {
        let is_source =
            path == self.config_path || self.sources.iter().any(|dir| path.starts_with(dir));
        !is_source
            || is_temp_file(path)
            || path.starts_with(&self.output_dir)
            || path == self.manifest_path
    }
}

/// Batches rapid file events until they settle.
struct Debouncer {
    pending: BTreeSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: BTreeSet::new(),
            last_event: None,
        }
    }

    fn add(&mut self, event: Event, scope: &WatchScope) {
        let before = self.pending.len();
        self.pending
            .extend(event.paths.into_iter().filter(|p| !scope.ignores(p)));
        if self.pending.len() > before {
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_millis(IDLE_POLL_MS)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

/// Short description of a batch of changed paths for the log.
fn describe_changes(paths: &[PathBuf], root: &Path) -> String {
    let rel = |p: &PathBuf| p.strip_prefix(root).unwrap_or(p).display().to_string();
    match paths {
        [] => "nothing changed".to_string(),
        [one] => format!("{} changed", rel(one)),
        [first, rest @ ..] => format!("{} and {} more changed", rel(first), rest.len()),
    }
}

fn rebuild(root: &Path, mode: BuildMode, events: Option<&Sender<BuildEvent>>) -> Result<(), RebuildError> {
    let mut builder = Builder::new(SiteContext::load(root)?);
    if let Some(tx) = events {
        builder = builder.with_events(tx.clone());
    }
    match mode {
        BuildMode::Full => builder.generate_all()?,
        BuildMode::Incremental => builder.update()?,
    };
    Ok(())
}

/// Watch a project and rebuild on change until `shutdown` is set.
///
/// `mode` picks the rebuild strategy: a full rebuild per change, or an
/// incremental update that only renders new posts.
pub fn watch_blocking(
    root: &Path,
    mode: BuildMode,
    events: Option<Sender<BuildEvent>>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), WatchError> {
    // notify reports absolute paths, so compare against absolute ones.
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let context = SiteContext::load(&root)?;
    let scope = WatchScope::new(&root, &context);

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).map_err(WatchError::Init)?;

    let targets = [
        (&context.content_dir, RecursiveMode::Recursive),
        (&context.template_dir, RecursiveMode::Recursive),
        (&root, RecursiveMode::NonRecursive),
    ];
    let mut watched = Vec::new();
    for (path, recursive) in targets {
        if !path.exists() {
            continue;
        }
        watcher.watch(path, recursive).map_err(|source| WatchError::Watch {
            path: path.clone(),
            source,
        })?;
        if path != &root {
            watched.push(path.strip_prefix(&root).unwrap_or(path).display().to_string());
        }
    }
    watched.push(CONFIG_FILENAME.to_string());
    println!("{}", status_line("watch", format!("watching {}", watched.join(", "))));

    let mut debouncer = Debouncer::new();
    while !shutdown.load(Ordering::SeqCst) {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) => debouncer.add(event, &scope),
            Ok(Err(e)) => println!("{}", status_line("watch", format!("error: {e}"))),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                let changed = debouncer.take();
                println!("{}", status_line("watch", describe_changes(&changed, &root)));
                if let Err(e) = rebuild(&root, mode, events.as_ref()) {
                    println!("{}", status_line("watch", format!("build failed: {e}")));
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }

    Ok(())
}
