//! Error types for sandboxed persistence operations.
//!
//! Every failure surfaced by a [`PersistenceProvider`](super::PersistenceProvider)
//! is a [`PersistenceError`]. Callers that only care about the broad category
//! (missing entry, conflict, bad argument, backend rejection) should match on
//! [`PersistenceError::kind`] rather than on individual variants.

use std::io;
use thiserror::Error;

/// Errors returned by persistence providers
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The path does not exist where existence is required
    #[error("Entry not found: {path}")]
    NotFound { path: String },

    /// The path exists where absence is required
    #[error("Entry already exists: {path}")]
    AlreadyExists { path: String },

    /// Subdirectories were left behind after removing a directory's files
    #[error("Directory still contains subdirectories: {path}")]
    DirectoryNotEmpty { path: String },

    /// The path cannot be expressed inside the sandbox
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Raw open-mode value outside the supported set
    #[error("Invalid open mode: {value}")]
    InvalidOpenMode { value: String },

    /// The sandbox backend rejected the operation
    #[error("Storage backend failure on '{path}': {source}")]
    Backend {
        path: String,
        #[source]
        source: io::Error,
    },

    /// No sandbox could be acquired
    #[error("Failed to initialize sandbox storage: {reason}")]
    Initialization { reason: String },

    /// The storage handle has already been released
    #[error("Storage handle has been disposed")]
    Disposed,
}

/// Broad error categories shared by all providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    BackendFailure,
    InitializationFailure,
    Disposed,
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl PersistenceError {
    /// Category of this error
    ///
    /// A directory that still holds subdirectories after its files were
    /// removed reports as [`ErrorKind::NotFound`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            PersistenceError::NotFound { .. } | PersistenceError::DirectoryNotEmpty { .. } => {
                ErrorKind::NotFound
            }
            PersistenceError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            PersistenceError::InvalidPath { .. } | PersistenceError::InvalidOpenMode { .. } => {
                ErrorKind::InvalidArgument
            }
            PersistenceError::Backend { .. } => ErrorKind::BackendFailure,
            PersistenceError::Initialization { .. } => ErrorKind::InitializationFailure,
            PersistenceError::Disposed => ErrorKind::Disposed,
        }
    }

    /// Translate a host I/O error raised while operating on `path`
    pub fn from_io(path: &str, err: io::Error) -> Self {
        match err.kind() {
            // NotADirectory: a file sits where a parent directory should be
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => PersistenceError::NotFound {
                path: path.to_string(),
            },
            io::ErrorKind::AlreadyExists => PersistenceError::AlreadyExists {
                path: path.to_string(),
            },
            _ => PersistenceError::Backend {
                path: path.to_string(),
                source: err,
            },
        }
    }

    pub(crate) fn not_found(path: &str) -> Self {
        PersistenceError::NotFound {
            path: path.to_string(),
        }
    }

    pub(crate) fn already_exists(path: &str) -> Self {
        PersistenceError::AlreadyExists {
            path: path.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PersistenceError::NotFound {
            path: "data/index.bin".to_string(),
        };
        assert_eq!(err.to_string(), "Entry not found: data/index.bin");

        let err = PersistenceError::InvalidOpenMode {
            value: "42".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid open mode: 42");
    }

    #[test]
    fn test_io_translation() {
        let err = PersistenceError::from_io("a", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = PersistenceError::from_io("a/b", io::Error::from(io::ErrorKind::NotADirectory));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = PersistenceError::from_io("a", io::Error::from(io::ErrorKind::AlreadyExists));
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        let err = PersistenceError::from_io("a", io::Error::from(io::ErrorKind::PermissionDenied));
        match err {
            PersistenceError::Backend { path, source } => {
                assert_eq!(path, "a");
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("Unexpected error translation: {other:?}"),
        }
    }

    #[test]
    fn test_kind_classification() {
        let err = PersistenceError::DirectoryNotEmpty {
            path: "d".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = PersistenceError::InvalidPath {
            path: "../x".to_string(),
            reason: "escapes".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(PersistenceError::Disposed.kind(), ErrorKind::Disposed);
    }
}
