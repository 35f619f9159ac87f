//! Undo log and deferred commit log over ordinary filesystem operations.
//!
//! While a transaction is active, handles record the inverse of every mutation
//! they are about to perform (or have just performed, for renames) and defer
//! physical deletions until commit.
//!
//! ## Replay
//!
//! - **Commit**: deferred deletions run in reverse insertion order
//! - **Rollback**: undo operations run in reverse insertion order; tombstones of
//!   objects that were only slated for deletion are cleared
//!
//! Both always leave the log inactive, even when replay fails part way. This is
//! a pseudo-transaction: other processes see every intermediate state and a
//! crash mid-transaction is not recovered.
//!
//! ## Example
//!
//! ```no_run
//! # use flourish_fs::FilesystemSession;
//! # fn example() -> flourish_fs::Result<()> {
//! let session = FilesystemSession::new();
//! let report = session.open_file("report.txt")?;
//!
//! session.begin()?;
//! report.write("draft 2")?;
//! report.rename("report-final.txt", false)?;
//! session.rollback()?; // report.txt holds "draft 1" again
//! # Ok(())
//! # }
//! ```

use crate::error::{FsError, Result};
use crate::fs::registry::{DeletionTrace, EntryId, PathRegistry};
use crate::fs::{remove_path, remove_placeholder};

use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// What an undo or deferred operation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A raw path, resolved as recorded.
    Path(PathBuf),
    /// A registry identity, resolved to its alias at replay time.
    Entry(EntryId),
}

impl Target {
    fn resolve(&self, registry: &PathRegistry) -> PathBuf {
        match self {
            Target::Path(path) => path.clone(),
            Target::Entry(id) => registry.alias(*id).to_path_buf(),
        }
    }
}

/// Inverse of a mutation, replayed on rollback.
#[derive(Debug, Clone)]
pub enum UndoOp {
    /// Write `old_bytes` back over the file.
    RestoreWrite { target: Target, old_bytes: Vec<u8> },
    /// Truncate the file by `appended_len` bytes.
    TruncateAppend { target: Target, appended_len: u64 },
    /// Remove an object created (or duplicated) during the transaction.
    DeleteCreated { target: Target },
    /// Move `new_path` back to `old_path`.
    ///
    /// `placeholder` is set when an empty file was planted at `old_path`.
    UndoRename {
        old_path: PathBuf,
        new_path: PathBuf,
        directory: bool,
        placeholder: bool,
    },
    /// Point the identity registered at `from` back at `to` without touching
    /// the disk.
    RestoreAlias { from: PathBuf, to: PathBuf },
}

/// Operation postponed until commit.
#[derive(Debug, Clone)]
pub enum DeferredOp {
    DeleteOnCommit { target: Target },
}

/// Outcome of [`TransactionLog::record_delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum DeleteDisposition {
    /// Recorded for commit: tombstone the object but leave it on disk.
    Deferred,
    /// No transaction: delete it now.
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Inactive,
    Active,
}

#[derive(Debug, Default)]
struct Journal {
    rollback_ops: Vec<UndoOp>,
    commit_ops: Vec<DeferredOp>,
}

impl Journal {
    /// Drops the pending placeholder removal for `path` once real content
    /// lands there.
    fn release_placeholder(&mut self, path: &Path) {
        let before = self.commit_ops.len();
        self.commit_ops.retain(|op| {
            !matches!(op, DeferredOp::DeleteOnCommit { target: Target::Path(p) } if p == path)
        });
        if self.commit_ops.len() != before {
            log::debug!("Placeholder at {} is now in use", path.display());
        }
    }
}

/// Single-level transaction log. The journal exists iff a transaction is active.
#[derive(Debug, Default)]
pub struct TransactionLog {
    journal: Option<Journal>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransactionState {
        if self.journal.is_some() {
            TransactionState::Active
        } else {
            TransactionState::Inactive
        }
    }

    pub fn is_active(&self) -> bool {
        self.journal.is_some()
    }

    pub fn begin(&mut self) -> Result<()> {
        if self.journal.is_some() {
            return Err(FsError::AlreadyActive);
        }

        self.journal = Some(Journal::default());
        log::info!("Filesystem transaction started");
        Ok(())
    }

    fn journal_mut(&mut self, action: &str) -> Result<&mut Journal> {
        self.journal.as_mut().ok_or_else(|| {
            FsError::programmer(format!(
                "Can not record a {action} outside of a filesystem transaction"
            ))
        })
    }

    /// Snapshots the current contents of `current` for rollback.
    ///
    /// Must run before the bytes are overwritten.
    pub fn record_write(&mut self, target: Target, current: &Path) -> Result<()> {
        let journal = self.journal_mut("write")?;
        journal.release_placeholder(current);

        let old_bytes = fs::read(current).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to snapshot {}: {}", current.display(), e),
            )
        })?;

        log::debug!(
            "Recorded write: {} ({} bytes saved)",
            current.display(),
            old_bytes.len()
        );
        journal
            .rollback_ops
            .push(UndoOp::RestoreWrite { target, old_bytes });
        Ok(())
    }

    /// Records an append of `appended_len` bytes; rollback truncates by that much.
    pub fn record_append(&mut self, target: Target, appended_len: u64) -> Result<()> {
        let journal = self.journal_mut("append")?;
        log::debug!("Recorded append of {appended_len} bytes");
        journal.rollback_ops.push(UndoOp::TruncateAppend {
            target,
            appended_len,
        });
        Ok(())
    }

    /// Records a newly created object so rollback removes it.
    pub fn record_create(&mut self, target: Target) -> Result<()> {
        let journal = self.journal_mut("create")?;
        log::debug!("Recorded create: {target:?}");
        journal.rollback_ops.push(UndoOp::DeleteCreated { target });
        Ok(())
    }

    /// Records an object produced by a copy so rollback removes it.
    pub fn record_duplicate(&mut self, target: Target) -> Result<()> {
        let journal = self.journal_mut("duplicate")?;
        log::debug!("Recorded duplicate: {target:?}");
        journal.rollback_ops.push(UndoOp::DeleteCreated { target });
        Ok(())
    }

    /// Records a completed rename of `old_path` to `new_path`.
    ///
    /// An empty placeholder file is planted at `old_path` to reserve the name
    /// until commit, when it is removed again. The rename is recorded even if
    /// the placeholder can not be written, so rollback still moves it back.
    pub fn record_rename(&mut self, old_path: &Path, new_path: &Path, directory: bool) -> Result<()> {
        let journal = self.journal_mut("rename")?;
        journal.release_placeholder(new_path);

        let planted = if old_path.exists() {
            Ok(false)
        } else {
            fs::write(old_path, b"").map(|()| true)
        };
        let placeholder = matches!(planted, Ok(true));

        log::debug!(
            "Recorded rename: {} → {}",
            old_path.display(),
            new_path.display()
        );
        journal.rollback_ops.push(UndoOp::UndoRename {
            old_path: old_path.to_path_buf(),
            new_path: new_path.to_path_buf(),
            directory,
            placeholder,
        });

        if placeholder {
            journal.commit_ops.push(DeferredOp::DeleteOnCommit {
                target: Target::Path(old_path.to_path_buf()),
            });
        }
        if let Err(e) = planted {
            return Err(std::io::Error::new(
                e.kind(),
                format!("Failed to reserve {}: {}", old_path.display(), e),
            )
            .into());
        }
        Ok(())
    }

    /// Records that the identity now registered at `from` used to be at `to`.
    pub fn record_alias(&mut self, from: &Path, to: &Path) -> Result<()> {
        let journal = self.journal_mut("alias change")?;
        journal.rollback_ops.push(UndoOp::RestoreAlias {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(())
    }

    /// Defers a deletion to commit time when a transaction is active.
    ///
    /// The caller tombstones the object; the log only schedules the physical
    /// removal.
    pub fn record_delete(&mut self, target: Target) -> DeleteDisposition {
        match self.journal.as_mut() {
            Some(journal) => {
                log::debug!("Deferred delete until commit: {target:?}");
                journal.commit_ops.push(DeferredOp::DeleteOnCommit { target });
                DeleteDisposition::Deferred
            }
            None => DeleteDisposition::Immediate,
        }
    }

    /// Performs the deferred deletions and ends the transaction.
    #[track_caller]
    pub fn commit(&mut self, registry: &mut PathRegistry) -> Result<()> {
        let journal = self.journal.take().ok_or(FsError::NoActiveTransaction)?;
        let trace = DeletionTrace::capture();

        log::info!(
            "Committing filesystem transaction ({} deferred operations)",
            journal.commit_ops.len()
        );

        for op in journal.commit_ops.into_iter().rev() {
            match op {
                DeferredOp::DeleteOnCommit {
                    target: Target::Path(path),
                } => remove_placeholder(&path)?,
                DeferredOp::DeleteOnCommit {
                    target: Target::Entry(id),
                } => {
                    let path = registry.alias(id).to_path_buf();
                    if registry.is_attached(id) {
                        remove_path(&path)?;
                        log::debug!("Deleted: {}", path.display());
                    } else {
                        // Another object was moved onto the path after the delete
                        log::debug!("Not deleting {}: replaced since", path.display());
                    }
                    registry.retire(id, trace.clone());
                }
            }
        }

        Ok(())
    }

    /// Undoes every recorded operation and ends the transaction.
    ///
    /// A no-op when no transaction is active.
    #[track_caller]
    pub fn rollback(&mut self, registry: &mut PathRegistry) -> Result<()> {
        let Some(journal) = self.journal.take() else {
            return Ok(());
        };
        let trace = DeletionTrace::capture();

        log::warn!(
            "Rolling back {} filesystem operations...",
            journal.rollback_ops.len()
        );

        // Lift tentative deletes first so objects removed by the replay below
        // keep the tombstone it sets.
        let reprieved: Vec<EntryId> = journal
            .commit_ops
            .iter()
            .filter_map(|op| match op {
                DeferredOp::DeleteOnCommit {
                    target: Target::Entry(id),
                } => Some(*id),
                DeferredOp::DeleteOnCommit {
                    target: Target::Path(_),
                } => None,
            })
            .collect();
        for id in &reprieved {
            registry.set_deletion(*id, None);
        }

        for op in journal.rollback_ops.into_iter().rev() {
            match op {
                UndoOp::RestoreWrite { target, old_bytes } => {
                    let path = target.resolve(registry);
                    fs::write(&path, &old_bytes).map_err(|e| {
                        std::io::Error::new(
                            e.kind(),
                            format!("Failed to restore {}: {}", path.display(), e),
                        )
                    })?;
                    log::debug!("Restored: {}", path.display());
                }
                UndoOp::TruncateAppend {
                    target,
                    appended_len,
                } => {
                    let path = target.resolve(registry);
                    let file = OpenOptions::new().write(true).open(&path)?;
                    let len = file.metadata()?.len();
                    file.set_len(len.saturating_sub(appended_len))?;
                    log::debug!("Truncated {} by {} bytes", path.display(), appended_len);
                }
                UndoOp::DeleteCreated { target } => {
                    let path = target.resolve(registry);
                    remove_path(&path)?;
                    match target {
                        Target::Entry(id) => registry.retire(id, trace.clone()),
                        Target::Path(path) => registry.mark_deleted(&path, Some(trace.clone())),
                    }
                    log::debug!("Removed created: {}", path.display());
                }
                UndoOp::UndoRename {
                    old_path,
                    new_path,
                    directory,
                    placeholder,
                } => {
                    if placeholder {
                        remove_placeholder(&old_path)?;
                    }
                    fs::rename(&new_path, &old_path).map_err(|e| {
                        std::io::Error::new(
                            e.kind(),
                            format!("Failed to move back {}: {}", new_path.display(), e),
                        )
                    })?;
                    if directory {
                        registry.update_alias_for_directory(&new_path, &old_path);
                    } else {
                        registry.update_alias(&new_path, &old_path);
                    }
                    log::debug!(
                        "Moved back: {} → {}",
                        new_path.display(),
                        old_path.display()
                    );
                }
                UndoOp::RestoreAlias { from, to } => registry.update_alias(&from, &to),
            }
        }

        // Identities pushed off their path by a rename are live again
        for id in reprieved {
            if !registry.is_deleted(id) {
                registry.reattach(id);
            }
        }

        log::info!("Rollback completed");
        Ok(())
    }

    /// What the active transaction has recorded, in recording order, with
    /// deferred deletes last.
    pub fn preview(&self, registry: &PathRegistry) -> Vec<PlannedChange> {
        let Some(journal) = &self.journal else {
            return Vec::new();
        };

        let undo = journal.rollback_ops.iter().map(|op| match op {
            UndoOp::RestoreWrite { target, .. } => PlannedChange::Write(target.resolve(registry)),
            UndoOp::TruncateAppend {
                target,
                appended_len,
            } => PlannedChange::Append(target.resolve(registry), *appended_len),
            UndoOp::DeleteCreated { target } => PlannedChange::Create(target.resolve(registry)),
            UndoOp::UndoRename {
                old_path, new_path, ..
            } => PlannedChange::Rename(old_path.clone(), new_path.clone()),
            UndoOp::RestoreAlias { from, to } => PlannedChange::Convert(to.clone(), from.clone()),
        });

        let deferred = journal.commit_ops.iter().filter_map(|op| match op {
            DeferredOp::DeleteOnCommit {
                target: Target::Entry(id),
            } => Some(PlannedChange::Delete(registry.alias(*id).to_path_buf())),
            // Rename placeholders are bookkeeping, not user-visible changes
            DeferredOp::DeleteOnCommit {
                target: Target::Path(_),
            } => None,
        });

        undo.chain(deferred).collect()
    }

    /// Returns operation statistics for the active transaction.
    pub fn stats(&self) -> TransactionStats {
        let mut stats = TransactionStats::default();
        let Some(journal) = &self.journal else {
            return stats;
        };

        for op in &journal.rollback_ops {
            match op {
                UndoOp::RestoreWrite { .. } => stats.files_written += 1,
                UndoOp::TruncateAppend { .. } => stats.files_appended += 1,
                UndoOp::DeleteCreated { .. } => stats.objects_created += 1,
                UndoOp::UndoRename { .. } => stats.objects_renamed += 1,
                UndoOp::RestoreAlias { .. } => {}
            }
        }
        for op in &journal.commit_ops {
            if let DeferredOp::DeleteOnCommit {
                target: Target::Entry(_),
            } = op
            {
                stats.deletes_pending += 1;
            }
        }

        stats.total = stats.files_written
            + stats.files_appended
            + stats.objects_created
            + stats.objects_renamed
            + stats.deletes_pending;
        stats
    }

    pub fn reset(&mut self) {
        self.journal = None;
    }
}

/// A recorded change, as reported by [`TransactionLog::preview`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedChange {
    Write(PathBuf),
    Append(PathBuf, u64),
    Create(PathBuf),
    Rename(PathBuf, PathBuf),
    /// Image written in a new format; the original is deleted separately.
    Convert(PathBuf, PathBuf),
    Delete(PathBuf),
}

impl fmt::Display for PlannedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedChange::Write(path) => write!(f, "Write: {}", path.display()),
            PlannedChange::Append(path, len) => {
                write!(f, "Append: {} (+{} bytes)", path.display(), len)
            }
            PlannedChange::Create(path) => write!(f, "Create: {}", path.display()),
            PlannedChange::Rename(from, to) => {
                write!(f, "Rename: {} → {}", from.display(), to.display())
            }
            PlannedChange::Convert(from, to) => {
                write!(f, "Convert: {} → {}", from.display(), to.display())
            }
            PlannedChange::Delete(path) => write!(f, "Delete: {}", path.display()),
        }
    }
}

/// Statistics about recorded operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub files_written: usize,
    pub files_appended: usize,
    pub objects_created: usize,
    pub objects_renamed: usize,
    pub deletes_pending: usize,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn canonical_temp() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        (temp, root)
    }

    #[test]
    fn test_new_log_is_inactive() {
        let log = TransactionLog::new();
        assert_eq!(log.state(), TransactionState::Inactive);
        assert!(!log.is_active());
    }

    #[test]
    fn test_begin_twice_fails() {
        let mut log = TransactionLog::new();
        log.begin().unwrap();

        assert!(matches!(log.begin(), Err(FsError::AlreadyActive)));
        assert!(log.is_active());
    }

    #[test]
    fn test_commit_without_begin_fails() {
        let mut log = TransactionLog::new();
        let mut registry = PathRegistry::new();

        assert!(matches!(
            log.commit(&mut registry),
            Err(FsError::NoActiveTransaction)
        ));
    }

    #[test]
    fn test_rollback_without_begin_is_noop() {
        let mut log = TransactionLog::new();
        let mut registry = PathRegistry::new();
        log.rollback(&mut registry).unwrap();
        assert!(!log.is_active());
    }

    #[test]
    fn test_record_outside_transaction_fails() {
        let (_temp, root) = canonical_temp();
        let file = root.join("a.txt");
        fs::write(&file, "a").unwrap();

        let mut log = TransactionLog::new();
        let result = log.record_write(Target::Path(file.clone()), &file);
        assert!(matches!(result, Err(FsError::Programmer(_))));
        assert_eq!(
            log.record_delete(Target::Path(file)),
            DeleteDisposition::Immediate
        );
    }

    #[test]
    fn test_rollback_restores_write_snapshot() {
        let (_temp, root) = canonical_temp();
        let file = root.join("a.txt");
        fs::write(&file, "original").unwrap();

        let mut registry = PathRegistry::new();
        let mut log = TransactionLog::new();
        log.begin().unwrap();
        log.record_write(Target::Path(file.clone()), &file).unwrap();
        fs::write(&file, "modified").unwrap();

        log.rollback(&mut registry).unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "original");
        assert!(!log.is_active());
    }

    #[test]
    fn test_rollback_replays_in_reverse_order() {
        let (_temp, root) = canonical_temp();
        let file = root.join("a.txt");
        fs::write(&file, "one").unwrap();

        let mut registry = PathRegistry::new();
        let mut log = TransactionLog::new();
        log.begin().unwrap();
        log.record_write(Target::Path(file.clone()), &file).unwrap();
        fs::write(&file, "two").unwrap();
        log.record_write(Target::Path(file.clone()), &file).unwrap();
        fs::write(&file, "three").unwrap();

        log.rollback(&mut registry).unwrap();

        // The oldest snapshot is applied last
        assert_eq!(fs::read_to_string(&file).unwrap(), "one");
    }

    #[test]
    fn test_record_rename_plants_placeholder() {
        let (_temp, root) = canonical_temp();
        let old = root.join("old.txt");
        let new = root.join("new.txt");
        fs::write(&old, "content").unwrap();

        let mut registry = PathRegistry::new();
        let mut log = TransactionLog::new();
        log.begin().unwrap();
        fs::rename(&old, &new).unwrap();
        log.record_rename(&old, &new, false).unwrap();

        assert!(old.exists());
        assert_eq!(fs::read(&old).unwrap().len(), 0);

        log.commit(&mut registry).unwrap();

        assert!(!old.exists());
        assert_eq!(fs::read_to_string(&new).unwrap(), "content");
    }

    #[test]
    fn test_rollback_rename_replaces_placeholder() {
        let (_temp, root) = canonical_temp();
        let old = root.join("old.txt");
        let new = root.join("new.txt");
        fs::write(&old, "content").unwrap();

        let mut registry = PathRegistry::new();
        let id = registry.hook(&old);
        let mut log = TransactionLog::new();
        log.begin().unwrap();
        fs::rename(&old, &new).unwrap();
        registry.update_alias(&old, &new);
        log.record_rename(&old, &new, false).unwrap();

        log.rollback(&mut registry).unwrap();

        assert_eq!(fs::read_to_string(&old).unwrap(), "content");
        assert!(!new.exists());
        assert_eq!(registry.alias(id), old.as_path());
    }

    #[test]
    fn test_commit_deletes_entries() {
        let (_temp, root) = canonical_temp();
        let file = root.join("a.txt");
        fs::write(&file, "a").unwrap();

        let mut registry = PathRegistry::new();
        let id = registry.hook(&file);
        let mut log = TransactionLog::new();
        log.begin().unwrap();
        assert_eq!(
            log.record_delete(Target::Entry(id)),
            DeleteDisposition::Deferred
        );
        assert!(file.exists());

        log.commit(&mut registry).unwrap();

        assert!(!file.exists());
        assert!(registry.is_deleted(id));
    }

    #[test]
    fn test_commit_keeps_reused_placeholder() {
        let (_temp, root) = canonical_temp();
        let old = root.join("old.txt");
        let new = root.join("new.txt");
        fs::write(&old, "content").unwrap();

        let mut registry = PathRegistry::new();
        let mut log = TransactionLog::new();
        log.begin().unwrap();
        fs::rename(&old, &new).unwrap();
        log.record_rename(&old, &new, false).unwrap();
        // Something real now lives where the placeholder was
        fs::write(&old, "replacement").unwrap();

        log.commit(&mut registry).unwrap();

        assert_eq!(fs::read_to_string(&old).unwrap(), "replacement");
    }

    #[test]
    fn test_rename_back_onto_placeholder_survives_commit() {
        let (_temp, root) = canonical_temp();
        let keep = root.join("keep");
        let tmp = root.join("tmp");
        fs::write(&keep, "").unwrap();

        let mut registry = PathRegistry::new();
        let mut log = TransactionLog::new();
        log.begin().unwrap();
        fs::rename(&keep, &tmp).unwrap();
        log.record_rename(&keep, &tmp, false).unwrap();
        fs::rename(&tmp, &keep).unwrap();
        log.record_rename(&tmp, &keep, false).unwrap();

        log.commit(&mut registry).unwrap();

        assert!(keep.is_file());
        assert!(!tmp.exists());
    }

    #[test]
    fn test_rename_is_recorded_when_placeholder_fails() {
        let (_temp, root) = canonical_temp();
        let old = root.join("missing/old.txt");
        let new = root.join("new.txt");
        fs::write(&new, "content").unwrap();

        let mut log = TransactionLog::new();
        log.begin().unwrap();
        assert!(log.record_rename(&old, &new, false).is_err());

        let stats = log.stats();
        assert_eq!(stats.objects_renamed, 1);
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn test_commit_skips_entry_replaced_after_delete() {
        let (_temp, root) = canonical_temp();
        let a = root.join("a.txt");
        let b = root.join("b.txt");
        fs::write(&a, "A").unwrap();
        fs::write(&b, "B").unwrap();

        let mut registry = PathRegistry::new();
        let a_id = registry.hook(&a);
        let b_id = registry.hook(&b);
        let mut log = TransactionLog::new();
        log.begin().unwrap();
        let _ = log.record_delete(Target::Entry(b_id));
        fs::rename(&a, &b).unwrap();
        registry.update_alias(&a, &b);

        log.commit(&mut registry).unwrap();

        assert_eq!(fs::read_to_string(&b).unwrap(), "A");
        assert!(registry.is_deleted(b_id));
        assert_eq!(registry.lookup(&b), Some(a_id));
    }

    #[test]
    fn test_stats_and_preview() {
        let (_temp, root) = canonical_temp();
        let file = root.join("a.txt");
        fs::write(&file, "a").unwrap();

        let mut registry = PathRegistry::new();
        let id = registry.hook(&file);
        let mut log = TransactionLog::new();
        log.begin().unwrap();
        log.record_write(Target::Entry(id), &file).unwrap();
        log.record_append(Target::Entry(id), 3).unwrap();
        let _ = log.record_delete(Target::Entry(id));

        let stats = log.stats();
        assert_eq!(stats.files_written, 1);
        assert_eq!(stats.files_appended, 1);
        assert_eq!(stats.deletes_pending, 1);
        assert_eq!(stats.total, 3);

        let preview = log.preview(&registry);
        assert_eq!(preview.len(), 3);
        assert_eq!(preview[0], PlannedChange::Write(file.clone()));
        assert_eq!(preview[1], PlannedChange::Append(file.clone(), 3));
        assert_eq!(preview[2], PlannedChange::Delete(file.clone()));
        assert!(preview[1].to_string().ends_with("(+3 bytes)"));
    }
}
