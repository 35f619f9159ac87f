//! Session owning the path identity map and the transaction log.
//!
//! Handles borrow the session, so [`FilesystemSession::reset`] (which needs
//! `&mut self`) can only run once every handle is gone.

use crate::error::{FsError, Result};
use crate::fs::directory::DirectoryHandle;
use crate::fs::file::FileHandle;
use crate::fs::registry::PathRegistry;
use crate::fs::transaction::{
    PlannedChange, Target, TransactionLog, TransactionState, TransactionStats,
};
use crate::fs::{canonicalize_target, make_unique_name, writable_parent};
use crate::image::backend::ImageBackend;
use crate::image::pnm::PnmBackend;
use crate::image::ImageHandle;

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default JPEG-style quality passed to the image backend.
pub const DEFAULT_QUALITY: u8 = 90;

/// A handle of whichever kind matches what is on disk.
#[derive(Debug)]
pub enum FsObject<'s> {
    File(FileHandle<'s>),
    Image(ImageHandle<'s>),
    Directory(DirectoryHandle<'s>),
}

impl FsObject<'_> {
    pub fn path(&self) -> PathBuf {
        match self {
            FsObject::File(file) => file.path(),
            FsObject::Image(image) => image.path(),
            FsObject::Directory(dir) => dir.path(),
        }
    }

    #[track_caller]
    pub fn delete(&self) -> Result<()> {
        match self {
            FsObject::File(file) => file.delete(),
            FsObject::Image(image) => image.delete(),
            FsObject::Directory(dir) => dir.delete(),
        }
    }
}

/// Explicit context for one logical run of filesystem work.
pub struct FilesystemSession {
    registry: RefCell<PathRegistry>,
    log: RefCell<TransactionLog>,
    backend: Box<dyn ImageBackend>,
    default_quality: u8,
}

impl Default for FilesystemSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FilesystemSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilesystemSession")
            .field("identities", &self.registry.borrow().len())
            .field("state", &self.log.borrow().state())
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl FilesystemSession {
    /// Creates a session with the built-in netpbm image backend.
    pub fn new() -> Self {
        Self {
            registry: RefCell::new(PathRegistry::new()),
            log: RefCell::new(TransactionLog::new()),
            backend: Box::new(PnmBackend),
            default_quality: DEFAULT_QUALITY,
        }
    }

    pub fn with_image_backend(mut self, backend: impl ImageBackend + 'static) -> Self {
        self.backend = Box::new(backend);
        self
    }

    pub fn with_default_quality(mut self, quality: u8) -> Self {
        self.default_quality = quality;
        self
    }

    pub(crate) fn registry(&self) -> RefMut<'_, PathRegistry> {
        self.registry.borrow_mut()
    }

    pub(crate) fn log(&self) -> RefMut<'_, TransactionLog> {
        self.log.borrow_mut()
    }

    pub(crate) fn backend(&self) -> &dyn ImageBackend {
        self.backend.as_ref()
    }

    pub(crate) fn default_quality(&self) -> u8 {
        self.default_quality
    }

    /// Starts a transaction. Fails with [`FsError::AlreadyActive`] if one is running.
    pub fn begin(&self) -> Result<()> {
        self.log().begin()
    }

    /// Performs deferred deletes and ends the transaction.
    #[track_caller]
    pub fn commit(&self) -> Result<()> {
        let mut registry = self.registry.borrow_mut();
        self.log.borrow_mut().commit(&mut registry)
    }

    /// Undoes the transaction. A no-op when none is running.
    #[track_caller]
    pub fn rollback(&self) -> Result<()> {
        let mut registry = self.registry.borrow_mut();
        self.log.borrow_mut().rollback(&mut registry)
    }

    pub fn is_inside_transaction(&self) -> bool {
        self.log.borrow().is_active()
    }

    pub fn state(&self) -> TransactionState {
        self.log.borrow().state()
    }

    /// Forgets every identity and abandons any open transaction without
    /// touching the disk.
    pub fn reset(&mut self) {
        if self.log.get_mut().is_active() {
            log::warn!("Session reset with an open transaction; nothing was rolled back");
        }
        self.log.get_mut().reset();
        self.registry.get_mut().reset();
    }

    /// Operations recorded by the active transaction.
    pub fn preview(&self) -> Vec<PlannedChange> {
        let registry = self.registry.borrow();
        self.log.borrow().preview(&registry)
    }

    pub fn stats(&self) -> TransactionStats {
        self.log.borrow().stats()
    }

    /// See [`make_unique_name`].
    pub fn make_unique_name(&self, path: impl AsRef<Path>, new_extension: Option<&str>) -> PathBuf {
        make_unique_name(path.as_ref(), new_extension)
    }

    /// Opens an existing regular file.
    pub fn open_file(&self, path: impl AsRef<Path>) -> Result<FileHandle<'_>> {
        FileHandle::open(self, path.as_ref())
    }

    /// Binds a handle without checking that the path is a readable file.
    pub fn open_file_unchecked(&self, path: impl AsRef<Path>) -> Result<FileHandle<'_>> {
        FileHandle::open_unchecked(self, path.as_ref())
    }

    /// Opens an existing image file.
    pub fn open_image(&self, path: impl AsRef<Path>) -> Result<ImageHandle<'_>> {
        ImageHandle::open(self, path.as_ref())
    }

    /// Opens an existing directory.
    pub fn open_directory(&self, path: impl AsRef<Path>) -> Result<DirectoryHandle<'_>> {
        DirectoryHandle::open(self, path.as_ref())
    }

    /// Returns a directory, image or file handle depending on what `path` is.
    pub fn create_object_from_path(&self, path: impl AsRef<Path>) -> Result<FsObject<'_>> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(FsObject::Directory(self.open_directory(path)?));
        }
        if path.is_file() && self.backend.image_type(path)?.is_some() {
            return Ok(FsObject::Image(self.open_image(path)?));
        }
        Ok(FsObject::File(self.open_file(path)?))
    }

    /// Creates a new file with `contents`. Fails if the path already exists.
    pub fn create_file(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<FileHandle<'_>> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(FsError::validation("No filename was specified"));
        }
        if path.exists() {
            return Err(FsError::validation(format!(
                "The file specified, {}, already exists",
                path.display()
            )));
        }

        let target = canonicalize_target(path)?;
        writable_parent(&target)?;
        fs::write(&target, contents)?;

        let file = FileHandle::bind(self, &target);
        // A previous object at this path may still carry a tombstone
        self.registry().set_deletion(file.id(), None);
        if self.is_inside_transaction() {
            self.log().record_create(Target::Entry(file.id()))?;
        }

        log::debug!("Created file: {}", target.display());
        Ok(file)
    }

    /// Creates a new directory. Its parent must exist.
    pub fn create_directory(&self, path: impl AsRef<Path>) -> Result<DirectoryHandle<'_>> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(FsError::validation("No directory name was specified"));
        }
        if path.exists() {
            return Err(FsError::validation(format!(
                "The directory specified, {}, already exists",
                path.display()
            )));
        }

        let target = canonicalize_target(path)?;
        writable_parent(&target)?;
        fs::create_dir(&target)?;

        let dir = DirectoryHandle::bind(self, &target);
        self.registry().set_deletion(dir.id(), None);
        if self.is_inside_transaction() {
            self.log().record_create(Target::Entry(dir.id()))?;
        }

        log::debug!("Created directory: {}", target.display());
        Ok(dir)
    }
}

impl Drop for FilesystemSession {
    fn drop(&mut self) {
        if self.log.get_mut().is_active() {
            log::warn!("Filesystem session dropped inside a transaction; changes were neither committed nor rolled back");
        }
    }
}
