// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for scopedfs

use thiserror::Error;

/// Result type alias
pub type StorageResult<T> = Result<T, StorageError>;

/// Main error type
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("No usable write grant for: {0}")]
    PermissionDenied(String),

    #[error("Cannot create entry in target: {0}")]
    CannotCreateTarget(String),

    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("Target file not found: {0}")]
    TargetFileNotFound(String),

    #[error("Target folder not found: {0}")]
    TargetFolderNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation canceled")]
    Canceled,

    #[error("Target folder cannot share a path with the source folder: {0}")]
    TargetSharesSourcePath(String),

    #[error("No space left on target path: {0}")]
    NoSpaceLeft(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unknown storage root: {0}")]
    UnknownRoot(String),

    #[error("Persisted grant ceiling reached ({0})")]
    GrantCeilingReached(usize),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::SourceNotFound(_)
                | StorageError::TargetFileNotFound(_)
                | StorageError::TargetFolderNotFound(_)
        )
    }

    /// True for out-of-space conditions, including the raw OS variant
    /// surfaced through an I/O error.
    pub fn is_out_of_space(&self) -> bool {
        match self {
            StorageError::NoSpaceLeft(_) => true,
            // ENOSPC
            StorageError::Io(e) => e.raw_os_error() == Some(28),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        assert!(StorageError::SourceNotFound("primary:a".into()).is_not_found());
        assert!(StorageError::TargetFolderNotFound("primary:b".into()).is_not_found());
        assert!(!StorageError::Canceled.is_not_found());
    }

    #[test]
    fn test_is_out_of_space() {
        assert!(StorageError::NoSpaceLeft("primary:big".into()).is_out_of_space());
        let enospc = std::io::Error::from_raw_os_error(28);
        assert!(StorageError::Io(enospc).is_out_of_space());
        let eio = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert!(!StorageError::Io(eio).is_out_of_space());
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::PermissionDenied("primary:Movies".into());
        assert_eq!(format!("{}", err), "No usable write grant for: primary:Movies");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StorageError = io_err.into();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
