//! Shared path identity map.
//!
//! Every handle constructed for the same canonical path receives the same
//! [`EntryId`]. The entry holds the path the identity currently resolves to
//! (its *alias*) and an optional tombstone, so a rename or delete made through
//! one handle is observed by all the others on their next access.
//!
//! Entries live in an arena and are never removed individually; a rename moves
//! the lookup key, a delete tombstones the entry. [`PathRegistry::reset`] drops
//! everything at once.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Suffix appended to the alias of an entry whose file was physically removed.
const DELETED_SUFFIX: &str = "deleted";

/// Stable index of a [`PathEntry`] inside one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

/// Where and when a path was deleted, for diagnostics.
#[derive(Clone)]
pub struct DeletionTrace {
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

impl DeletionTrace {
    /// Captures the caller's location and, if `RUST_BACKTRACE` allows it, a
    /// backtrace.
    #[track_caller]
    pub fn capture() -> Self {
        Self {
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Debug for DeletionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeletionTrace")
            .field("location", &format_args!("{}", self.location))
            .finish_non_exhaustive()
    }
}

impl fmt::Display for DeletionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deleted at {}", self.location)?;
        if self.backtrace.status() == BacktraceStatus::Captured {
            write!(f, "\n{}", self.backtrace)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct PathEntry {
    alias: PathBuf,
    deleted: Option<DeletionTrace>,
}

/// Arena of path identities keyed by canonical path.
#[derive(Debug, Default)]
pub struct PathRegistry {
    entries: Vec<PathEntry>,
    by_path: HashMap<PathBuf, EntryId>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identity for `path`, creating it on first use.
    pub fn hook(&mut self, path: &Path) -> EntryId {
        if let Some(id) = self.by_path.get(path) {
            return *id;
        }

        let id = EntryId(self.entries.len());
        self.entries.push(PathEntry {
            alias: path.to_path_buf(),
            deleted: None,
        });
        self.by_path.insert(path.to_path_buf(), id);
        id
    }

    /// Returns the identity currently registered for `path` without creating one.
    pub fn lookup(&self, path: &Path) -> Option<EntryId> {
        self.by_path.get(path).copied()
    }

    /// Current path of an identity.
    pub fn alias(&self, id: EntryId) -> &Path {
        &self.entries[id.0].alias
    }

    /// Tombstone of an identity, if it has been deleted.
    pub fn deletion(&self, id: EntryId) -> Option<&DeletionTrace> {
        self.entries[id.0].deleted.as_ref()
    }

    pub fn is_deleted(&self, id: EntryId) -> bool {
        self.entries[id.0].deleted.is_some()
    }

    /// Sets or clears (`None`) the tombstone of an identity.
    pub fn set_deletion(&mut self, id: EntryId, trace: Option<DeletionTrace>) {
        self.entries[id.0].deleted = trace;
    }

    /// Sets or clears the tombstone of whatever identity `path` resolves to.
    pub fn mark_deleted(&mut self, path: &Path, trace: Option<DeletionTrace>) {
        let id = self.hook(path);
        self.set_deletion(id, trace);
    }

    /// Moves the identity registered at `old` so that it resolves to `new`.
    ///
    /// Any identity previously registered at `new` is detached from the key but
    /// keeps its own alias.
    pub fn update_alias(&mut self, old: &Path, new: &Path) {
        if old == new {
            return;
        }

        let id = self.hook(old);
        self.by_path.remove(old);
        self.entries[id.0].alias = new.to_path_buf();
        self.by_path.insert(new.to_path_buf(), id);

        log::debug!("Registry: {} → {}", old.display(), new.display());
    }

    /// Whether lookups of the identity's alias still resolve to it.
    ///
    /// False once another identity has been moved onto the same path.
    pub fn is_attached(&self, id: EntryId) -> bool {
        self.by_path.get(&self.entries[id.0].alias) == Some(&id)
    }

    /// Drops the lookup key for `path`. The identity keeps its alias, and the
    /// next hook of `path` creates a fresh one.
    pub fn detach(&mut self, path: &Path) -> Option<EntryId> {
        self.by_path.remove(path)
    }

    /// Registers an identity under its alias again, unless another identity
    /// holds that key.
    pub fn reattach(&mut self, id: EntryId) {
        let alias = self.entries[id.0].alias.clone();
        self.by_path.entry(alias).or_insert(id);
    }

    /// Like [`update_alias`](Self::update_alias), and also rewrites every
    /// identity located below `old_dir`.
    pub fn update_alias_for_directory(&mut self, old_dir: &Path, new_dir: &Path) {
        if old_dir == new_dir {
            return;
        }

        self.hook(old_dir);

        let moved: Vec<(PathBuf, EntryId)> = self
            .by_path
            .iter()
            .filter(|(key, _)| key.starts_with(old_dir))
            .map(|(key, id)| (key.clone(), *id))
            .collect();

        for (key, _) in &moved {
            self.by_path.remove(key);
        }

        for (key, id) in moved {
            let Ok(suffix) = key.strip_prefix(old_dir) else {
                continue;
            };
            let new_key = if suffix.as_os_str().is_empty() {
                new_dir.to_path_buf()
            } else {
                new_dir.join(suffix)
            };
            self.entries[id.0].alias = new_key.clone();
            self.by_path.insert(new_key, id);
        }

        log::debug!(
            "Registry: {}/** → {}/**",
            old_dir.display(),
            new_dir.display()
        );
    }

    /// Tombstones an identity whose file is physically gone and points its
    /// alias at a sentinel name, so a later file created at the same path gets a
    /// fresh identity.
    pub fn retire(&mut self, id: EntryId, trace: DeletionTrace) {
        let entry = &mut self.entries[id.0];
        if self.by_path.get(&entry.alias) == Some(&id) {
            self.by_path.remove(&entry.alias);
        }

        let mut sentinel = entry.alias.clone().into_os_string();
        sentinel.push(".");
        sentinel.push(DELETED_SUFFIX);

        entry.alias = PathBuf::from(sentinel);
        entry.deleted = Some(trace);
    }

    /// Number of identities ever created since the last reset.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.by_path.clear();
    }
}
