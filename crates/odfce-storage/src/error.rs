//! Storage error types.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Filesystem operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    /// Creating a directory.
    CreateDir,
    /// Listing a directory.
    ListDir,
    /// Reading a file or its metadata.
    Read,
    /// Writing a file.
    Write,
    /// Renaming a file.
    Rename,
    /// Removing a file.
    Remove,
}

impl std::fmt::Display for IoOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::CreateDir => "create directory",
            Self::ListDir => "list directory",
            Self::Read => "read",
            Self::Write => "write",
            Self::Rename => "rename",
            Self::Remove => "remove",
        })
    }
}

/// Errors raised by the blob and key-value stores.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The blob does not exist.
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// The blob path escapes the store root or is empty.
    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    /// A filesystem call failed.
    #[error("Failed to {op} '{path}': {source}")]
    Io {
        /// What was attempted.
        op: IoOp,
        /// Path involved; the source path for renames.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A key-value table file is not valid JSON.
    #[error("Corrupt table file '{path}': {source}")]
    CorruptTable {
        /// Table file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// A table could not be serialized.
    #[error("Failed to serialize table: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Another run holds the symbol's lock.
    #[error("Symbol is locked by another run: {0}")]
    Locked(String),

    /// Table does not exist.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// A row lacks the table's key attributes.
    #[error("Row is missing key '{key}' for table '{table}'")]
    MissingKey {
        /// Table name.
        table: String,
        /// Missing key attribute.
        key: String,
    },

    /// Rows were still rejected after every retry.
    #[error("{count} rows rejected by table '{table}' after {attempts} attempts")]
    Rejected {
        /// Table name.
        table: String,
        /// Rows left unwritten.
        count: usize,
        /// Attempts made.
        attempts: u32,
    },
}

impl StorageError {
    /// Returns a `map_err` adapter wrapping an I/O error for `path`.
    pub(crate) fn io(op: IoOp, path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_message_names_operation() {
        let err = StorageError::io(IoOp::Rename, Path::new("/data/FX/a.rs3"))(
            std::io::Error::other("busy"),
        );
        assert_eq!(err.to_string(), "Failed to rename '/data/FX/a.rs3': busy");
    }
}
