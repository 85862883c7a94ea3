// SPDX-License-Identifier: AGPL-3.0-or-later
//! Capability grant model

use chrono::{DateTime, Utc};
use scopedfs_core::{StorageKind, StoragePath};
use serde::{Deserialize, Serialize};

/// Opaque handle to a persisted grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantHandle(pub u64);

impl GrantHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// A persisted, revocable authorization over a subtree of a root
///
/// Issued by the host's grant flow; the registry only consumes and retires
/// these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityGrant {
    pub handle: GrantHandle,
    /// Scope path the grant was issued for; authorizes all descendants.
    pub scope: StoragePath,
    pub read: bool,
    pub write: bool,
    pub issued_at: DateTime<Utc>,
}

impl CapabilityGrant {
    /// A full read+write grant, the shape the host issues for storage roots.
    pub fn read_write(handle: GrantHandle, scope: StoragePath) -> Self {
        Self {
            handle,
            scope,
            read: true,
            write: true,
            issued_at: Utc::now(),
        }
    }

    /// Whether this grant counts against the persisted ceiling.
    ///
    /// Only full read+write grants over external or removable roots do;
    /// internal-root grants need no persisted capability.
    pub fn is_persistable(&self) -> bool {
        self.read
            && self.write
            && matches!(
                self.scope.kind(),
                StorageKind::PrimaryExternal | StorageKind::Removable
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(s: &str) -> StoragePath {
        StoragePath::parse(s).unwrap()
    }

    #[test]
    fn test_read_write_is_persistable() {
        let grant = CapabilityGrant::read_write(GrantHandle::new(1), scope("primary:Movies"));
        assert!(grant.is_persistable());
        let removable =
            CapabilityGrant::read_write(GrantHandle::new(2), scope("1D0E-1A2F:DCIM"));
        assert!(removable.is_persistable());
    }

    #[test]
    fn test_internal_scope_not_persistable() {
        let grant = CapabilityGrant::read_write(GrantHandle::new(1), scope("data:files"));
        assert!(!grant.is_persistable());
    }

    #[test]
    fn test_partial_flags_not_persistable() {
        let mut grant = CapabilityGrant::read_write(GrantHandle::new(1), scope("primary:Movies"));
        grant.write = false;
        assert!(!grant.is_persistable());
    }

    #[test]
    fn test_unknown_root_not_persistable() {
        let grant = CapabilityGrant::read_write(GrantHandle::new(1), scope("bogus:x"));
        assert!(!grant.is_persistable());
    }

    #[test]
    fn test_serde_round_trip() {
        let grant = CapabilityGrant::read_write(GrantHandle::new(7), scope("primary:Music"));
        let json = serde_json::to_string(&grant).unwrap();
        assert_eq!(serde_json::from_str::<CapabilityGrant>(&json).unwrap(), grant);
    }
}
