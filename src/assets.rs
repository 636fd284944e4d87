//! Verbatim asset mirroring.
//!
//! Two kinds of directories are copied into the output tree untouched:
//!
//! - **Template assets** (`template_assets`, default `css`, `js`, `img`) from
//!   the template directory, once per build.
//! - **Post assets** (`copy_dirs`, default `img`, `files`) found next to a
//!   post, once per rendered post. All posts share the same destination, so
//!   `content/2024/img/a.png` and `content/img/b.png` both land in
//!   `<output>/img/`.
//!
//! [`copy_tree`] is the single copy primitive. When the destination does not
//! exist yet the whole source subtree is copied; when it does, only the
//! source's immediate files are copied over whatever is already there, so
//! repeated copies are idempotent overwrites.
//!
//! A missing source directory is expected and silently skipped. Any IO
//! failure while copying is returned to the caller.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Failed to copy {src} to {dst}: {source}")]
pub struct AssetError {
    pub src: PathBuf,
    pub dst: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Mirror `src` into `dst`. Returns whether anything was copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<bool, AssetError> {
    if !src.is_dir() {
        return Ok(false);
    }
    let wrap = |source| AssetError {
        src: src.to_path_buf(),
        dst: dst.to_path_buf(),
        source,
    };
    if dst.exists() {
        copy_files(src, dst).map_err(wrap)?;
    } else {
        fs::create_dir_all(dst).map_err(wrap)?;
        copy_dir_recursive(src, dst).map_err(wrap)?;
    }
    Ok(true)
}

/// Copy the template-level asset directories into the output root.
///
/// Returns the destination of every directory that was copied.
pub fn copy_template_assets(
    template_dir: &Path,
    output_dir: &Path,
    names: &[String],
) -> Result<Vec<PathBuf>, AssetError> {
    copy_named(template_dir, output_dir, names)
}

/// Copy a post's sibling asset directories into the output root.
pub fn copy_post_assets(
    post_dir: &Path,
    output_dir: &Path,
    names: &[String],
) -> Result<Vec<PathBuf>, AssetError> {
    copy_named(post_dir, output_dir, names)
}

fn copy_named(from: &Path, to: &Path, names: &[String]) -> Result<Vec<PathBuf>, AssetError> {
    let mut copied = Vec::new();
    for name in names {
        let dst = to.join(name);
        if copy_tree(&from.join(name), &dst)? {
            copied.push(dst);
        }
    }
    Ok(copied)
}

/// Copy only the immediate files of `src` into existing `dst`.
fn copy_files(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::copy(entry.path(), dst.join(entry.file_name()))?;
        }
    }
    Ok(())
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}
