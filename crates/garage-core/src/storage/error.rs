//! Store errors
//!
//! Every variant belongs to one of three kinds (see [`ErrorKind`]):
//! the store could not be opened, it was used before being opened, or an
//! individual request against an open store failed.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`StorageError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The store could not be opened or upgraded. Retry the whole open.
    Open,
    /// An operation was attempted before the store was opened.
    NotOpen,
    /// A single read, write or delete request failed.
    Storage,
}

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The data directory could not be created
    #[error("Cannot create data directory {path:?}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The data directory is not writable by this user
    #[error("No permission to write to {path:?}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No space left for the data directory
    #[error("Out of disk space at {path:?}")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The database file could not be opened
    #[error("Failed to open database at '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// An upgrade step failed; the upgrade transaction was rolled back
    #[error("Schema upgrade to version {version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: Box<StorageError>,
    },

    /// The database was written by a newer build
    #[error("Database schema version {found} is newer than supported version {supported}")]
    VersionTooNew { found: u32, supported: u32 },

    /// Operation attempted before `Store::open` succeeded
    #[error("Store is not open. Call Store::open before using it.")]
    NotOpen,

    /// The connection lock was poisoned by a panicking holder
    #[error("Store connection lock poisoned")]
    LockPoisoned,

    /// A record was rejected before being written
    #[error("Invalid record for '{table}': {reason}")]
    InvalidRecord { table: &'static str, reason: String },

    /// SQLite request error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Wrap an I/O failure on the data directory at `path`
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        if error.kind() == io::ErrorKind::PermissionDenied {
            StorageError::PermissionDenied {
                path,
                source: error,
            }
        } else if is_out_of_space(&error) {
            StorageError::DiskFull {
                path,
                source: error,
            }
        } else {
            StorageError::CreateDirectory {
                path,
                source: error,
            }
        }
    }

    /// Which of the three error kinds this belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::CreateDirectory { .. }
            | StorageError::PermissionDenied { .. }
            | StorageError::DiskFull { .. }
            | StorageError::Open { .. }
            | StorageError::Migration { .. }
            | StorageError::VersionTooNew { .. } => ErrorKind::Open,
            StorageError::NotOpen => ErrorKind::NotOpen,
            StorageError::LockPoisoned
            | StorageError::InvalidRecord { .. }
            | StorageError::Database(_)
            | StorageError::Serialization(_) => ErrorKind::Storage,
        }
    }

    /// Whether the user can fix the cause and retry
    pub fn is_recoverable(&self) -> bool {
        match self {
            StorageError::DiskFull { .. }
            | StorageError::PermissionDenied { .. }
            | StorageError::Open { .. } => true,
            _ => self.is_quota_exceeded(),
        }
    }

    /// A hint to show next to the error message
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        let hint = match self {
            StorageError::DiskFull { .. } => "Free some disk space, then retry.",
            StorageError::PermissionDenied { .. } | StorageError::CreateDirectory { .. } => {
                "Point data_dir at a directory you can write to."
            }
            StorageError::Open { .. } => {
                "Close other programs using the database; if the file is damaged, move it aside."
            }
            StorageError::VersionTooNew { .. } => {
                "The database was written by a newer garage. Upgrade garage to open it."
            }
            StorageError::NotOpen => "Call Store::open first.",
            _ if self.is_quota_exceeded() => "Free some disk space, then retry.",
            _ => return None,
        };
        Some(hint)
    }

    /// SQLite ran out of room while writing
    fn is_quota_exceeded(&self) -> bool {
        matches!(
            self,
            StorageError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::DiskFull
        )
    }
}

/// ENOSPC / EDQUOT and their Windows counterparts
fn is_out_of_space(error: &io::Error) -> bool {
    #[cfg(unix)]
    const CODES: &[i32] = &[28, 122];
    #[cfg(not(unix))]
    const CODES: &[i32] = &[39, 112];

    if let Some(code) = error.raw_os_error() {
        return CODES.contains(&code);
    }
    error.to_string().to_lowercase().contains("no space left")
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
