//! File system handles with transaction support.
//!
//! Handles are bound to a [`FilesystemSession`], which owns the shared path
//! identity map and the transaction log. Mutations made through any handle are
//! visible to every other handle for the same path, and are recorded for
//! rollback while a transaction is active.

pub mod directory;
pub mod file;
pub mod mime;
pub mod registry;
pub mod session;
pub mod transaction;

pub use directory::DirectoryHandle;
pub use file::FileHandle;
pub use registry::{DeletionTrace, EntryId, PathRegistry};
pub use session::{FilesystemSession, FsObject};
pub use transaction::{
    DeferredOp, DeleteDisposition, PlannedChange, Target, TransactionLog, TransactionState,
    TransactionStats, UndoOp,
};

use crate::error::{FsError, Result};

use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static COPY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_copy\d+$").expect("copy suffix pattern is valid"));

/// Returns a path that does not exist yet, derived from `path`.
///
/// With `new_extension`, the extension is swapped first. A free path is
/// returned unchanged; otherwise any `_copyN` suffix is stripped from the stem
/// and `_copy1`, `_copy2`, … are tried until one is free. Nothing is created.
pub fn make_unique_name(path: &Path, new_extension: Option<&str>) -> PathBuf {
    let path = match new_extension {
        Some(ext) => path.with_extension(ext),
        None => path.to_path_buf(),
    };

    if !path.exists() {
        return path;
    }

    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned());
    let base = COPY_SUFFIX.replace(&stem, "").into_owned();

    let mut n: u64 = 1;
    loop {
        let name = match &extension {
            Some(ext) => format!("{base}_copy{n}.{ext}"),
            None => format!("{base}_copy{n}"),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Permission-bit writability check.
pub(crate) fn is_writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

/// Parent directory of `path`, which must exist and be writable.
pub(crate) fn writable_parent(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| FsError::validation(format!("{} has no parent directory", path.display())))?;

    if !is_writable(parent) {
        return Err(FsError::NotWritable(parent.to_path_buf()));
    }
    Ok(parent.to_path_buf())
}

/// Absolute, symlink-resolved form of a path whose parent exists.
///
/// The final component does not need to exist.
pub(crate) fn canonicalize_target(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(fs::canonicalize(path)?);
    }

    let name = path.file_name().ok_or_else(|| {
        FsError::validation(format!("The path specified, {}, has no file name", path.display()))
    })?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir()?,
    };

    if !parent.is_dir() {
        return Err(FsError::programmer(format!(
            "The path specified, {}, is inside of a directory that does not exist",
            path.display()
        )));
    }

    Ok(fs::canonicalize(parent)?.join(name))
}

/// Removes a file or a whole directory tree. Missing paths are ignored.
pub(crate) fn remove_path(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("Already gone: {}", path.display());
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Removes a rename placeholder, unless something real has replaced it.
pub(crate) fn remove_placeholder(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() == 0 => fs::remove_file(path)?,
        Ok(_) => log::warn!(
            "Placeholder {} was replaced during the transaction; leaving it",
            path.display()
        ),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
