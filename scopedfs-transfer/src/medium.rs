// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transfer medium abstraction
//!
//! The engine never touches storage directly; stat, chunked reads, writes
//! and deletes go through a [`TransferMedium`]. [`MemoryMedium`] is the
//! hermetic implementation used by tests and embedders without real media.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use scopedfs_core::{StorageError, StoragePath, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use tokio::sync::RwLock;

/// Byte stream type
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    File,
    Folder,
}

/// What a medium knows about an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStat {
    pub kind: ItemKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl ItemStat {
    pub fn file(size: u64) -> Self {
        Self {
            kind: ItemKind::File,
            size,
            modified: None,
        }
    }

    pub fn folder() -> Self {
        Self {
            kind: ItemKind::Folder,
            size: 0,
            modified: None,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == ItemKind::File
    }
}

/// Byte-copy and stat primitives backing the transfer engine
#[async_trait]
pub trait TransferMedium: Send + Sync {
    /// `Ok(None)` for an item that simply does not exist.
    async fn stat(&self, path: &StoragePath) -> StorageResult<Option<ItemStat>>;

    /// Chunked source stream for an existing file.
    async fn read_file(&self, path: &StoragePath) -> StorageResult<ByteStream>;

    /// Create an empty file, truncating any previous content. Must surface
    /// `CannotCreateTarget` and `NoSpaceLeft` distinctly from plain I/O
    /// failures.
    async fn create_file(&self, path: &StoragePath) -> StorageResult<()>;

    /// Append one chunk, returning the bytes written. Out-of-space must
    /// surface as `NoSpaceLeft`.
    async fn append_chunk(&self, path: &StoragePath, chunk: Bytes) -> StorageResult<u64>;

    /// Delete a file, or a folder with everything beneath it.
    async fn delete(&self, path: &StoragePath) -> StorageResult<()>;
}

#[derive(Default)]
struct MemoryState {
    files: HashMap<StoragePath, FileEntry>,
    folders: HashSet<StoragePath>,
}

struct FileEntry {
    data: Vec<u8>,
    modified: DateTime<Utc>,
}

impl MemoryState {
    fn is_folder(&self, path: &StoragePath) -> bool {
        path.is_root() || self.folders.contains(path)
    }

    fn used_bytes(&self) -> u64 {
        self.files.values().map(|f| f.data.len() as u64).sum()
    }
}

/// In-memory transfer medium
///
/// Root paths always exist as folders. A byte capacity can be configured
/// so out-of-space behavior is testable.
pub struct MemoryMedium {
    state: RwLock<MemoryState>,
    capacity: Option<u64>,
    chunk_size: usize,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            capacity: None,
            chunk_size: 64 * 1024,
        }
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Create a folder, including its ancestors.
    pub async fn add_folder(&self, path: StoragePath) {
        let mut state = self.state.write().await;
        let mut current = path;
        loop {
            state.folders.insert(current.clone());
            match current.parent() {
                Some(parent) if !parent.is_root() => current = parent,
                _ => break,
            }
        }
    }

    /// Write a file directly, bypassing the chunk path.
    pub async fn put_file(&self, path: StoragePath, data: impl Into<Vec<u8>>) {
        let mut state = self.state.write().await;
        state.files.insert(
            path,
            FileEntry {
                data: data.into(),
                modified: Utc::now(),
            },
        );
    }

    /// Full content of a file, when it exists.
    pub async fn file_bytes(&self, path: &StoragePath) -> Option<Vec<u8>> {
        self.state.read().await.files.get(path).map(|f| f.data.clone())
    }
}

impl Default for MemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransferMedium for MemoryMedium {
    async fn stat(&self, path: &StoragePath) -> StorageResult<Option<ItemStat>> {
        let state = self.state.read().await;
        if let Some(file) = state.files.get(path) {
            return Ok(Some(ItemStat {
                kind: ItemKind::File,
                size: file.data.len() as u64,
                modified: Some(file.modified),
            }));
        }
        if state.is_folder(path) {
            return Ok(Some(ItemStat::folder()));
        }
        Ok(None)
    }

    async fn read_file(&self, path: &StoragePath) -> StorageResult<ByteStream> {
        let state = self.state.read().await;
        let file = state
            .files
            .get(path)
            .ok_or_else(|| StorageError::SourceNotFound(path.to_string()))?;
        let chunks: Vec<StorageResult<Bytes>> = file
            .data
            .chunks(self.chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn create_file(&self, path: &StoragePath) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let parent_exists = path
            .parent()
            .map(|p| state.is_folder(&p))
            .unwrap_or(false);
        if !parent_exists {
            return Err(StorageError::CannotCreateTarget(path.to_string()));
        }
        state.files.insert(
            path.clone(),
            FileEntry {
                data: Vec::new(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn append_chunk(&self, path: &StoragePath, chunk: Bytes) -> StorageResult<u64> {
        let mut state = self.state.write().await;
        if let Some(capacity) = self.capacity {
            if state.used_bytes() + chunk.len() as u64 > capacity {
                return Err(StorageError::NoSpaceLeft(path.to_string()));
            }
        }
        let file = state
            .files
            .get_mut(path)
            .ok_or_else(|| StorageError::TargetFileNotFound(path.to_string()))?;
        file.data.extend_from_slice(&chunk);
        file.modified = Utc::now();
        Ok(chunk.len() as u64)
    }

    async fn delete(&self, path: &StoragePath) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.files.remove(path).is_some() {
            return Ok(());
        }
        if state.folders.contains(path) {
            state.folders.retain(|f| !path.covers(f));
            state.files.retain(|p, _| !path.covers(p));
            return Ok(());
        }
        Err(StorageError::TargetFileNotFound(path.to_string()))
    }
}
