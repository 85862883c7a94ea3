// SPDX-License-Identifier: AGPL-3.0-or-later
//! scopedfs Grants
//!
//! Tracks the capability grants the host has persisted for storage roots:
//! deduplicates grants covered by an ancestor scope, evicts grants that no
//! longer probe writable, and keeps the live count under the host ceiling.

pub mod grant;
pub mod registry;
pub mod store;

pub use grant::{CapabilityGrant, GrantHandle};
pub use registry::{CapabilityRegistry, RegistryConfig, SweepStats, WritabilityProbe};
pub use store::{GrantStore, MemoryGrantStore};
