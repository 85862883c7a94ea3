// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persisted grant store
//!
//! The registry never talks to platform storage directly; it goes through
//! an injected [`GrantStore`] so hosts can plug their persistence and tests
//! can run against [`MemoryGrantStore`].

use crate::grant::{CapabilityGrant, GrantHandle};
use async_trait::async_trait;
use scopedfs_core::{StoragePath, StorageResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Enumerable store of currently persisted grants
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Snapshot of every grant the host currently persists.
    async fn persisted_grants(&self) -> StorageResult<Vec<CapabilityGrant>>;

    /// Record a newly issued grant.
    async fn persist(&self, grant: CapabilityGrant) -> StorageResult<()>;

    /// Release a grant. Returns `Ok(false)` when the handle was already
    /// released; double release is benign, never an error.
    async fn release(&self, handle: GrantHandle) -> StorageResult<bool>;
}

/// In-memory grant store
pub struct MemoryGrantStore {
    grants: RwLock<HashMap<GrantHandle, CapabilityGrant>>,
    next_handle: AtomicU64,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self {
            grants: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Mint and persist a read+write grant, standing in for the host's
    /// issuance flow.
    pub async fn issue(&self, scope: StoragePath) -> CapabilityGrant {
        let handle = GrantHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let grant = CapabilityGrant::read_write(handle, scope);
        self.grants.write().await.insert(handle, grant.clone());
        grant
    }
}

impl Default for MemoryGrantStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
    async fn persisted_grants(&self) -> StorageResult<Vec<CapabilityGrant>> {
        Ok(self.grants.read().await.values().cloned().collect())
    }

    async fn persist(&self, grant: CapabilityGrant) -> StorageResult<()> {
        self.grants.write().await.insert(grant.handle, grant);
        Ok(())
    }

    async fn release(&self, handle: GrantHandle) -> StorageResult<bool> {
        Ok(self.grants.write().await.remove(&handle).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_issue_and_list() {
        let store = MemoryGrantStore::new();
        let a = store.issue(StoragePath::parse("primary:Movies").unwrap()).await;
        let b = store.issue(StoragePath::parse("primary:Music").unwrap()).await;
        assert_ne!(a.handle, b.handle);
        assert_eq!(store.persisted_grants().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let store = MemoryGrantStore::new();
        let grant = store.issue(StoragePath::parse("primary:Movies").unwrap()).await;
        assert!(store.release(grant.handle).await.unwrap());
        assert!(!store.release(grant.handle).await.unwrap());
        assert!(store.persisted_grants().await.unwrap().is_empty());
    }
}
