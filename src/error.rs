//! Error types for flourish-fs.
//!
//! All operations return `Result<T>` which aliases `Result<T, FsError>`.

use crate::fs::registry::DeletionTrace;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from filesystem handles and transactions.
#[derive(Debug, Error)]
pub enum FsError {
    /// Bad input to a constructor or operation.
    #[error("{0}")]
    Validation(String),

    /// The handle's path was deleted earlier in this session.
    #[error("The file {} has been deleted ({trace})", path.display())]
    Deleted { path: PathBuf, trace: DeletionTrace },

    /// File or containing directory is not writable.
    #[error("{} is not writable", .0.display())]
    NotWritable(PathBuf),

    /// Resource problem outside the caller's control (e.g. image backend).
    #[error("{0}")]
    Environment(String),

    /// API misuse.
    #[error("{0}")]
    Programmer(String),

    /// `begin()` while a transaction is already running.
    #[error("There is already a filesystem transaction in progress")]
    AlreadyActive,

    /// `commit()` with no transaction running.
    #[error("There is no filesystem transaction in progress")]
    NoActiveTransaction,

    /// File system operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unexpected error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of [`FsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Deleted,
    NotWritable,
    Environment,
    Programmer,
}

impl FsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::Validation(_) => ErrorKind::Validation,
            FsError::Deleted { .. } => ErrorKind::Deleted,
            FsError::NotWritable(_) => ErrorKind::NotWritable,
            FsError::Programmer(_) | FsError::AlreadyActive | FsError::NoActiveTransaction => {
                ErrorKind::Programmer
            }
            FsError::Environment(_) | FsError::Io(_) | FsError::Other(_) => {
                ErrorKind::Environment
            }
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        FsError::Validation(msg.into())
    }

    pub(crate) fn programmer(msg: impl Into<String>) -> Self {
        FsError::Programmer(msg.into())
    }

    pub(crate) fn environment(msg: impl Into<String>) -> Self {
        FsError::Environment(msg.into())
    }
}

/// Result type alias for flourish-fs operations.
pub type Result<T> = std::result::Result<T, FsError>;
