//! Handle to a regular file.
//!
//! A `FileHandle` is only a session reference plus a registry identity. Every
//! operation looks the current path and tombstone up through the session, so
//! handles for the same file stay consistent across renames and deletes.

use crate::error::{FsError, Result};
use crate::fs::directory::DirectoryHandle;
use crate::fs::mime::mime_type;
use crate::fs::registry::{DeletionTrace, EntryId};
use crate::fs::session::FilesystemSession;
use crate::fs::transaction::{DeleteDisposition, Target};
use crate::fs::{canonicalize_target, is_writable, make_unique_name, writable_parent};

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// Number of leading bytes read for mime sniffing.
const SNIFF_LEN: u64 = 512;

#[derive(Clone, Copy)]
pub struct FileHandle<'s> {
    session: &'s FilesystemSession,
    id: EntryId,
}

impl fmt::Debug for FileHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path())
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

impl PartialEq for FileHandle<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.session, other.session) && self.id == other.id
    }
}

impl<'s> FileHandle<'s> {
    pub(crate) fn open(session: &'s FilesystemSession, path: &Path) -> Result<Self> {
        if path.as_os_str().is_empty() {
            return Err(FsError::validation("No filename was specified"));
        }

        let meta = fs::metadata(path).map_err(|_| {
            FsError::validation(format!(
                "The file specified, {}, does not exist or is not readable",
                path.display()
            ))
        })?;
        if meta.is_dir() {
            return Err(FsError::validation(format!(
                "The file specified, {}, is actually a directory",
                path.display()
            )));
        }
        // Readability
        fs::File::open(path).map_err(|_| {
            FsError::validation(format!(
                "The file specified, {}, is not readable",
                path.display()
            ))
        })?;

        let canonical = fs::canonicalize(path)?;
        Ok(Self::bind(session, &canonical))
    }

    pub(crate) fn open_unchecked(session: &'s FilesystemSession, path: &Path) -> Result<Self> {
        let target = canonicalize_target(path)?;
        Ok(Self::bind(session, &target))
    }

    /// Binds to the identity for an already canonical path.
    ///
    /// Heals a stale tombstone when the path exists again outside a transaction.
    pub(crate) fn bind(session: &'s FilesystemSession, canonical: &Path) -> Self {
        let id = session.registry().hook(canonical);

        if !session.is_inside_transaction() && canonical.exists() {
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

    pub(crate) fn session(&self) -> &'s FilesystemSession {
        self.session
    }

    /// Current path, following renames made through any handle.
    pub fn path(&self) -> PathBuf {
        self.session.registry().alias(self.id).to_path_buf()
    }

    pub fn is_deleted(&self) -> bool {
        self.session.registry().is_deleted(self.id)
    }

    /// Current path, or [`FsError::Deleted`] if the file has been deleted.
    pub(crate) fn live_path(&self) -> Result<PathBuf> {
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

    pub fn extension(&self) -> Option<String> {
        self.path()
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }

    /// Directory containing the file.
    pub fn parent(&self) -> Result<DirectoryHandle<'s>> {
        let path = self.live_path()?;
        let parent = path
            .parent()
            .ok_or_else(|| FsError::validation(format!("{} has no parent directory", path.display())))?;
        DirectoryHandle::open(self.session, parent)
    }

    pub fn size(&self) -> Result<u64> {
        Ok(fs::metadata(self.live_path()?)?.len())
    }

    pub fn modified(&self) -> Result<SystemTime> {
        Ok(fs::metadata(self.live_path()?)?.modified()?)
    }

    pub fn mime_type(&self) -> Result<&'static str> {
        let path = self.live_path()?;
        let mut head = Vec::with_capacity(SNIFF_LEN as usize);
        fs::File::open(&path)?
            .take(SNIFF_LEN)
            .read_to_end(&mut head)?;
        Ok(mime_type(&path, &head))
    }

    pub fn is_writable(&self) -> Result<bool> {
        Ok(is_writable(&self.live_path()?))
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(self.live_path()?)?)
    }

    pub fn read_to_string(&self) -> Result<String> {
        Ok(fs::read_to_string(self.live_path()?)?)
    }

    fn writable_path(&self) -> Result<PathBuf> {
        let path = self.live_path()?;
        if !is_writable(&path) {
            return Err(FsError::NotWritable(path));
        }
        Ok(path)
    }

    /// Replaces the file's contents.
    pub fn write(&self, data: impl AsRef<[u8]>) -> Result<&Self> {
        let path = self.writable_path()?;

        if self.session.is_inside_transaction() {
            self.session
                .log()
                .record_write(Target::Entry(self.id), &path)?;
        }

        fs::write(&path, data.as_ref()).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to write {}: {}", path.display(), e),
            )
        })?;
        log::debug!("Wrote {} bytes to {}", data.as_ref().len(), path.display());
        Ok(self)
    }

    /// Appends to the end of the file.
    pub fn append(&self, data: impl AsRef<[u8]>) -> Result<&Self> {
        let path = self.writable_path()?;
        let data = data.as_ref();

        if self.session.is_inside_transaction() {
            self.session
                .log()
                .record_append(Target::Entry(self.id), data.len() as u64)?;
        }

        OpenOptions::new()
            .append(true)
            .open(&path)?
            .write_all(data)?;
        log::debug!("Appended {} bytes to {}", data.len(), path.display());
        Ok(self)
    }

    /// Deletes the file.
    ///
    /// Inside a transaction the file stays on disk until commit but is treated
    /// as deleted by every handle immediately. Deleting twice is a no-op.
    #[track_caller]
    pub fn delete(&self) -> Result<()> {
        if self.is_deleted() {
            return Ok(());
        }

        let path = self.path();
        writable_parent(&path)?;
        let trace = DeletionTrace::capture();

        let disposition = self.session.log().record_delete(Target::Entry(self.id));
        match disposition {
            DeleteDisposition::Deferred => {
                self.session.registry().set_deletion(self.id, Some(trace));
            }
            DeleteDisposition::Immediate => {
                fs::remove_file(&path)?;
                self.session.registry().retire(self.id, trace);
                log::debug!("Deleted: {}", path.display());
            }
        }
        Ok(())
    }

    /// Renames the file.
    ///
    /// A bare file name stays in the current directory; other relative paths
    /// resolve against the working directory. Unless `overwrite` is set, an
    /// existing target is replaced by a `_copyN` variant of its name.
    pub fn rename(&self, new_path: impl AsRef<Path>, overwrite: bool) -> Result<&Self> {
        let current = self.live_path()?;
        let dir = writable_parent(&current)?;
        let requested = new_path.as_ref();

        let is_bare_name = matches!(
            requested.components().collect::<Vec<_>>().as_slice(),
            [Component::Normal(_)]
        );
        let requested = if is_bare_name {
            dir.join(requested)
        } else {
            requested.to_path_buf()
        };
        let mut target = canonicalize_target(&requested)?;

        if target == current {
            if overwrite {
                return Ok(self);
            }
            target = make_unique_name(&target, None);
        } else if target.exists() {
            if !overwrite {
                target = make_unique_name(&target, None);
            } else if !is_writable(&target) {
                return Err(FsError::NotWritable(target));
            } else if self.session.is_inside_transaction() {
                // Keep what is about to be overwritten
                self.session
                    .log()
                    .record_write(Target::Path(target.clone()), &target)?;
            }
        }

        fs::rename(&current, &target).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to rename {} → {}: {}",
                    current.display(),
                    target.display(),
                    e
                ),
            )
        })?;
        self.session.registry().update_alias(&current, &target);

        if self.session.is_inside_transaction() {
            self.session.log().record_rename(&current, &target, false)?;
        }

        log::info!("Renamed: {} → {}", current.display(), target.display());
        Ok(self)
    }

    /// Moves the file into `directory`, keeping its name.
    pub fn move_to(&self, directory: impl AsRef<Path>, overwrite: bool) -> Result<&Self> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(FsError::validation(format!(
                "The directory specified, {}, does not exist",
                directory.display()
            )));
        }
        let name = self.name();
        self.rename(directory.join(name), overwrite)
    }

    /// Copies the file (bytes and permissions) into `new_directory`, or next
    /// to itself when `None`, and returns a handle to the copy.
    pub fn duplicate(&self, new_directory: Option<&Path>, overwrite: bool) -> Result<FileHandle<'s>> {
        let current = self.live_path()?;

        let dir = match new_directory {
            Some(dir) if dir.is_dir() => fs::canonicalize(dir)?,
            Some(dir) => {
                return Err(FsError::validation(format!(
                    "The directory specified, {}, does not exist",
                    dir.display()
                )));
            }
            None => current
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| FsError::validation("The file has no parent directory"))?,
        };
        if !is_writable(&dir) {
            return Err(FsError::NotWritable(dir));
        }

        let mut target = dir.join(self.name());
        let mut replaced = false;
        if target == current || (target.exists() && !overwrite) {
            target = make_unique_name(&target, None);
        } else if target.exists() {
            if !is_writable(&target) {
                return Err(FsError::NotWritable(target));
            }
            if self.session.is_inside_transaction() {
                self.session
                    .log()
                    .record_write(Target::Path(target.clone()), &target)?;
            }
            replaced = true;
        }

        fs::copy(&current, &target)?;
        fs::set_permissions(&target, fs::metadata(&current)?.permissions())?;

        // A file deleted earlier in the transaction stays deleted; the copy
        // gets an identity of its own
        let mut fresh = !replaced;
        if replaced {
            let mut registry = self.session.registry();
            if let Some(old) = registry.lookup(&target)
                && registry.is_deleted(old)
            {
                registry.detach(&target);
                fresh = true;
            }
        }

        let copy = FileHandle::bind(self.session, &target);
        self.session.registry().set_deletion(copy.id, None);
        // Rollback of a plain overwrite restores the old bytes and keeps the identity
        if self.session.is_inside_transaction() && fresh {
            self.session
                .log()
                .record_duplicate(Target::Entry(copy.id))?;
        }

        log::debug!("Duplicated: {} → {}", current.display(), target.display());
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(content: &str) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().canonicalize().unwrap().join("file.txt");
        fs::write(&path, content).unwrap();
        (temp, path)
    }

    #[test]
    fn test_open_validates_path() {
        let temp = TempDir::new().unwrap();
        let session = FilesystemSession::new();

        assert!(matches!(
            session.open_file(""),
            Err(FsError::Validation(_))
        ));
        assert!(matches!(
            session.open_file(temp.path().join("missing.txt")),
            Err(FsError::Validation(_))
        ));
        assert!(matches!(
            session.open_file(temp.path()),
            Err(FsError::Validation(_))
        ));
    }

    #[test]
    fn test_open_unchecked_allows_missing_file() {
        let temp = TempDir::new().unwrap();
        let session = FilesystemSession::new();

        let handle = session
            .open_file_unchecked(temp.path().join("later.txt"))
            .unwrap();
        assert_eq!(handle.name(), "later.txt");
    }

    #[test]
    fn test_write_and_append_chain() {
        let (_temp, path) = setup("");
        let session = FilesystemSession::new();
        let file = session.open_file(&path).unwrap();

        file.write("hello").unwrap().append(", world").unwrap();

        assert_eq!(file.read_to_string().unwrap(), "hello, world");
        assert_eq!(file.size().unwrap(), 12);
    }

    #[test]
    fn test_write_readonly_file_fails() {
        let (_temp, path) = setup("locked");
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms).unwrap();

        let session = FilesystemSession::new();
        let file = session.open_file(&path).unwrap();

        assert!(!file.is_writable().unwrap());
        assert!(matches!(file.write("x"), Err(FsError::NotWritable(_))));
        assert!(matches!(file.append("x"), Err(FsError::NotWritable(_))));
    }

    #[test]
    fn test_delete_outside_transaction_retargets_alias() {
        let (_temp, path) = setup("bye");
        let session = FilesystemSession::new();
        let file = session.open_file(&path).unwrap();

        file.delete().unwrap();

        assert!(!path.exists());
        assert!(file.path().to_string_lossy().ends_with(".deleted"));
        let err = file.read().unwrap_err();
        assert!(matches!(err, FsError::Deleted { .. }));
        assert!(err.to_string().contains("file.rs"));
    }

    #[test]
    fn test_open_heals_tombstone_outside_transaction() {
        let (_temp, path) = setup("back");
        let session = FilesystemSession::new();
        session
            .registry()
            .mark_deleted(&path, Some(DeletionTrace::capture()));

        session.begin().unwrap();
        assert!(session.open_file(&path).unwrap().is_deleted());
        session.rollback().unwrap();

        let file = session.open_file(&path).unwrap();
        assert!(!file.is_deleted());
        assert_eq!(file.read_to_string().unwrap(), "back");
    }

    #[test]
    fn test_rename_bare_name_stays_in_directory() {
        let (_temp, path) = setup("content");
        let session = FilesystemSession::new();
        let file = session.open_file(&path).unwrap();

        file.rename("renamed.txt", false).unwrap();

        assert_eq!(file.path(), path.with_file_name("renamed.txt"));
        assert!(!path.exists());
    }

    #[test]
    fn test_rename_into_missing_directory_fails() {
        let (_temp, path) = setup("content");
        let session = FilesystemSession::new();
        let file = session.open_file(&path).unwrap();

        let target = path.parent().unwrap().join("nope/renamed.txt");
        assert!(matches!(
            file.rename(target, false),
            Err(FsError::Programmer(_))
        ));
        assert_eq!(file.path(), path);
    }

    #[test]
    fn test_rename_to_self_with_overwrite_is_noop() {
        let (_temp, path) = setup("content");
        let session = FilesystemSession::new();
        let file = session.open_file(&path).unwrap();

        file.rename(&path, true).unwrap();
        assert_eq!(file.path(), path);
    }

    #[test]
    fn test_rename_without_overwrite_uniquifies() {
        let (_temp, path) = setup("mine");
        let other = path.with_file_name("taken.txt");
        fs::write(&other, "theirs").unwrap();

        let session = FilesystemSession::new();
        let file = session.open_file(&path).unwrap();
        file.rename(&other, false).unwrap();

        assert_eq!(file.path(), path.with_file_name("taken_copy1.txt"));
        assert_eq!(fs::read_to_string(&other).unwrap(), "theirs");
    }

    #[test]
    fn test_duplicate_next_to_original() {
        let (_temp, path) = setup("twin");
        let session = FilesystemSession::new();
        let file = session.open_file(&path).unwrap();

        let copy = file.duplicate(None, false).unwrap();

        assert_eq!(copy.path(), path.with_file_name("file_copy1.txt"));
        assert_eq!(copy.read_to_string().unwrap(), "twin");
        assert_ne!(copy, file);
    }

    #[test]
    fn test_mime_type_and_extension() {
        let (_temp, path) = setup("plain words");
        let session = FilesystemSession::new();
        let file = session.open_file(&path).unwrap();

        assert_eq!(file.extension().as_deref(), Some("txt"));
        assert_eq!(file.mime_type().unwrap(), "text/plain");
    }
}
