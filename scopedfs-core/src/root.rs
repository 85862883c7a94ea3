// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage root identifiers and classification

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token of the primary external root.
pub const PRIMARY: &str = "primary";

/// Token of the app-internal root.
pub const DATA: &str = "data";

/// Serial shape of a removable medium id, e.g. `AAAA-BBBB` or `1D0E-1A2F`.
static REMOVABLE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Za-z0-9]{4}-[A-Za-z0-9]{4}$").expect("valid pattern"));

/// Identifier of a storage root (e.g., "primary", "data", "1D0E-1A2F")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RootId(String);

impl RootId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The primary external root.
    pub fn primary() -> Self {
        Self(PRIMARY.to_string())
    }

    /// The app-internal root.
    pub fn data() -> Self {
        Self(DATA.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> StorageKind {
        StorageKind::classify(self)
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RootId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Kind of storage root, derived purely from the root id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKind {
    /// App-internal root; needs no persisted capability.
    Internal,
    /// Primary external root.
    PrimaryExternal,
    /// Removable medium, identified by its serial.
    Removable,
    Unknown,
}

impl StorageKind {
    /// Classify a root id. Pure and total; performs no I/O.
    ///
    /// Reserved tokens are matched before the serial pattern, so a
    /// removable id can never shadow them.
    pub fn classify(id: &RootId) -> Self {
        match id.as_str() {
            DATA => StorageKind::Internal,
            PRIMARY => StorageKind::PrimaryExternal,
            other if REMOVABLE_ID_PATTERN.is_match(other) => StorageKind::Removable,
            _ => StorageKind::Unknown,
        }
    }

    pub fn is_removable(self) -> bool {
        self == StorageKind::Removable
    }
}
