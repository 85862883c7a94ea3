// SPDX-License-Identifier: AGPL-3.0-or-later
//! scopedfs Core
//!
//! Root classification, the storage path model, and the shared error
//! taxonomy for capability-scoped multi-root storage access.

pub mod error;
pub mod operations;
pub mod path;
pub mod root;

pub use error::{StorageError, StorageResult};
pub use operations::{ConflictPolicy, TransferMode};
pub use path::{find_unique_parents, RootLayout, StoragePath};
pub use root::{RootId, StorageKind};
