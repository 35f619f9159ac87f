//! Handle to a directory.
//!
//! Used by file handles to validate their parent, and usable on its own to
//! scan, rename and delete whole trees with the same transaction semantics as
//! files.

use crate::error::{FsError, Result};
use crate::fs::registry::{DeletionTrace, EntryId};
use crate::fs::session::{FilesystemSession, FsObject};
use crate::fs::transaction::{DeleteDisposition, Target};
use crate::fs::{canonicalize_target, is_writable, writable_parent};

use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy)]
pub struct DirectoryHandle<'s> {
    session: &'s FilesystemSession,
    id: EntryId,
}

impl fmt::Debug for DirectoryHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryHandle")
            .field("path", &self.path())
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

impl<'s> DirectoryHandle<'s> {
    pub(crate) fn open(session: &'s FilesystemSession, path: &Path) -> Result<Self> {
        if path.as_os_str().is_empty() {
            return Err(FsError::validation("No directory was specified"));
        }
        if !path.is_dir() {
            return Err(FsError::validation(format!(
                "The directory specified, {}, does not exist or is not a directory",
                path.display()
            )));
        }

        let canonical = fs::canonicalize(path)?;
        Ok(Self::bind(session, &canonical))
    }

    pub(crate) fn bind(session: &'s FilesystemSession, canonical: &Path) -> Self {
        let id = session.registry().hook(canonical);

        if !session.is_inside_transaction() && canonical.is_dir() {
            let mut registry = session.registry();
            if registry.is_deleted(id) {
                log::warn!(
                    "{} was deleted earlier in this session but exists again; reusing it",
                    canonical.display()
                );
                registry.set_deletion(id, None);
            }
        }

        Self { session, id }
    }

    pub(crate) fn id(&self) -> EntryId {
        self.id
    }

    pub fn path(&self) -> PathBuf {
        self.session.registry().alias(self.id).to_path_buf()
    }

    pub fn is_deleted(&self) -> bool {
        self.session.registry().is_deleted(self.id)
    }

    fn live_path(&self) -> Result<PathBuf> {
        let registry = self.session.registry();
        let path = registry.alias(self.id).to_path_buf();
        match registry.deletion(self.id) {
            Some(trace) => Err(FsError::Deleted {
                path,
                trace: trace.clone(),
            }),
            None => Ok(path),
        }
    }

    pub fn name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_writable(&self) -> Result<bool> {
        Ok(is_writable(&self.live_path()?))
    }

    pub fn parent(&self) -> Result<DirectoryHandle<'s>> {
        let path = self.live_path()?;
        let parent = path
            .parent()
            .ok_or_else(|| FsError::validation(format!("{} has no parent directory", path.display())))?;
        DirectoryHandle::open(self.session, parent)
    }

    /// Lists the directory's children, sorted by path, as typed handles.
    ///
    /// Children that are logically deleted in this session are skipped. With
    /// `filter`, only children whose name matches are returned.
    pub fn scan(&self, filter: Option<&Regex>) -> Result<Vec<FsObject<'s>>> {
        let path = self.live_path()?;

        let mut children: Vec<PathBuf> = fs::read_dir(&path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        children.sort();

        let mut objects = Vec::with_capacity(children.len());
        for child in children {
            if let Some(re) = filter {
                let name = child
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if !re.is_match(&name) {
                    continue;
                }
            }

            let tombstoned = {
                let registry = self.session.registry();
                registry
                    .lookup(&child)
                    .is_some_and(|id| registry.is_deleted(id))
            };
            if tombstoned && self.session.is_inside_transaction() {
                continue;
            }

            objects.push(self.session.create_object_from_path(&child)?);
        }
        Ok(objects)
    }

    /// Renames the directory. Handles for anything inside it follow along.
    ///
    /// Fails if the target already exists.
    pub fn rename(&self, new_path: impl AsRef<Path>) -> Result<&Self> {
        let current = self.live_path()?;
        writable_parent(&current)?;

        let requested = new_path.as_ref();
        let requested = if requested.is_relative() && requested.components().count() == 1 {
            current
                .parent()
                .map(|p| p.join(requested))
                .unwrap_or_else(|| requested.to_path_buf())
        } else {
            requested.to_path_buf()
        };
        let target = canonicalize_target(&requested)?;

        if target == current {
            return Ok(self);
        }
        if target.exists() {
            return Err(FsError::validation(format!(
                "Target directory already exists: {}",
                target.display()
            )));
        }
        if target.starts_with(&current) {
            return Err(FsError::programmer(format!(
                "Can not move {} inside of itself",
                current.display()
            )));
        }

        fs::rename(&current, &target)?;
        self.session
            .registry()
            .update_alias_for_directory(&current, &target);

        if self.session.is_inside_transaction() {
            self.session.log().record_rename(&current, &target, true)?;
        }

        log::info!("Moved: {} → {}", current.display(), target.display());
        Ok(self)
    }

    /// Deletes the directory and everything in it.
    ///
    /// Children are deleted through their own handles first, so outstanding
    /// handles observe the delete. Inside a transaction nothing leaves the disk
    /// until commit.
    #[track_caller]
    pub fn delete(&self) -> Result<()> {
        if self.is_deleted() {
            return Ok(());
        }

        let path = self.path();
        writable_parent(&path)?;
        let trace = DeletionTrace::capture();

        for child in self.scan(None)? {
            child.delete()?;
        }

        let disposition = self.session.log().record_delete(Target::Entry(self.id));
        match disposition {
            DeleteDisposition::Deferred => {
                self.session.registry().set_deletion(self.id, Some(trace));
            }
            DeleteDisposition::Immediate => {
                fs::remove_dir_all(&path)?;
                self.session.registry().retire(self.id, trace);
                log::debug!("Deleted directory: {}", path.display());
            }
        }
        Ok(())
    }
}
