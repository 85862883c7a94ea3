// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transfer events and error codes

use scopedfs_core::{StorageError, StoragePath};
use serde::{Deserialize, Serialize};

/// State reported by a running transfer, in strict forward order
///
/// `InProgress` may recur with non-decreasing `bytes_moved`; every other
/// state is visited at most once and `Completed` / `Error` are terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransferEvent {
    /// Checking whether the transfer requirements are met.
    Validating,
    /// Requirements met; destination resolved and byte total computed.
    Preparing { total_bytes: u64 },
    /// Removing the conflicting destination item before the copy.
    DeletingConflictedFile,
    InProgress {
        /// `100 * bytes_moved / total_bytes`, in `[0, 100]`.
        progress: f32,
        bytes_moved: u64,
        /// Instantaneous throughput in bytes per second.
        write_speed: u64,
    },
    Completed {
        /// The resulting file.
        file: StoragePath,
        /// For a move, whether the source could be removed after the copy.
        /// A failed source deletion does not fail the operation.
        source_deletion: Option<SourceFileDeletionResult>,
    },
    Error {
        code: TransferErrorCode,
        message: Option<String>,
    },
}

impl TransferEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferEvent::Completed { .. } | TransferEvent::Error { .. }
        )
    }
}

/// Whether the original source could be deleted after a successful move copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFileDeletionResult {
    Success,
    Failure,
}

impl SourceFileDeletionResult {
    pub fn from_success(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Failure classification surfaced through [`TransferEvent::Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferErrorCode {
    StoragePermissionDenied,
    CannotCreateFileInTarget,
    SourceFileNotFound,
    TargetFileNotFound,
    TargetFolderNotFound,
    UnknownIoError,
    Canceled,
    TargetFolderCannotHaveSamePathWithSourceFolder,
    NoSpaceLeftOnTargetPath,
}

impl From<&StorageError> for TransferErrorCode {
    fn from(err: &StorageError) -> Self {
        match err {
            StorageError::PermissionDenied(_) => Self::StoragePermissionDenied,
            StorageError::CannotCreateTarget(_) => Self::CannotCreateFileInTarget,
            StorageError::SourceNotFound(_) => Self::SourceFileNotFound,
            StorageError::TargetFileNotFound(_) => Self::TargetFileNotFound,
            StorageError::TargetFolderNotFound(_) => Self::TargetFolderNotFound,
            StorageError::Canceled => Self::Canceled,
            StorageError::TargetSharesSourcePath(_) => {
                Self::TargetFolderCannotHaveSamePathWithSourceFolder
            }
            e if e.is_out_of_space() => Self::NoSpaceLeftOnTargetPath,
            _ => Self::UnknownIoError,
        }
    }
}
