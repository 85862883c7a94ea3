// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage path abstraction
//!
//! A [`StoragePath`] locates an item inside one storage root as a plain
//! segment sequence, independent of any platform path type. Converting to
//! and from absolute path strings goes through a [`RootLayout`], the mount
//! table injected by the host.

use crate::root::{RootId, StorageKind};
use crate::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Path within a storage root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoragePath {
    /// Root identifier (e.g., "primary", "data", "1D0E-1A2F")
    pub root: RootId,
    /// Path segments
    pub segments: Vec<String>,
}

impl StoragePath {
    pub fn new(root: impl Into<RootId>, relative: impl AsRef<str>) -> Self {
        let segments = relative
            .as_ref()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Self {
            root: root.into(),
            segments,
        }
    }

    pub fn root_path(root: impl Into<RootId>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
        }
    }

    pub fn join(&self, name: impl AsRef<str>) -> Self {
        let mut segments = self.segments.clone();
        for part in name.as_ref().split('/').filter(|s| !s.is_empty()) {
            if part == ".." {
                segments.pop();
            } else if part != "." {
                segments.push(part.to_string());
            }
        }
        Self {
            root: self.root.clone(),
            segments,
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            let mut segments = self.segments.clone();
            segments.pop();
            Some(Self {
                root: self.root.clone(),
                segments,
            })
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn kind(&self) -> StorageKind {
        self.root.kind()
    }

    /// Relative path under the root, with no leading or trailing separator.
    pub fn relative_path(&self) -> String {
        self.segments.join("/")
    }

    /// True when `self`'s segment sequence is a strict prefix of `other`'s
    /// within the same root.
    pub fn is_ancestor_of(&self, other: &StoragePath) -> bool {
        self.root == other.root
            && self.segments.len() < other.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Ancestor-or-equal relation.
    pub fn covers(&self, other: &StoragePath) -> bool {
        self == other || self.is_ancestor_of(other)
    }

    /// Canonical absolute path string under the given layout.
    ///
    /// Pure string composition; the mount and the relative path are joined
    /// by exactly one separator, and a root path is the bare mount.
    pub fn to_absolute(&self, layout: &RootLayout) -> StorageResult<String> {
        let mount = layout.mount(&self.root)?;
        if self.segments.is_empty() {
            Ok(mount)
        } else {
            Ok(format!("{}/{}", mount, self.relative_path()))
        }
    }

    /// Inverse of [`to_absolute`](Self::to_absolute); `None` when the path
    /// does not fall under any known root form.
    pub fn from_absolute(layout: &RootLayout, path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        // The primary and data mounts nest under the removable base on the
        // default layout, so the specific mounts are matched first.
        if let Some(rest) = strip_mount(path, &layout.primary_mount) {
            return Some(Self::new(RootId::primary(), rest));
        }
        if let Some(rest) = strip_mount(path, &layout.data_mount) {
            return Some(Self::new(RootId::data(), rest));
        }
        let base = format!("{}/", layout.removable_mount_base);
        let rest = path.strip_prefix(&base)?;
        let (id, relative) = rest.split_once('/').unwrap_or((rest, ""));
        let root = RootId::new(id);
        if root.kind().is_removable() {
            Some(Self::new(root, relative))
        } else {
            None
        }
    }

    /// Parse the simple `root:relative/path` notation used for grant scopes.
    pub fn parse(simple: &str) -> Option<Self> {
        let (root, relative) = simple.split_once(':').unwrap_or((simple, ""));
        if root.is_empty() {
            return None;
        }
        Some(Self::new(RootId::new(root), relative))
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.root, self.relative_path())
    }
}

fn strip_mount<'a>(path: &'a str, mount: &str) -> Option<&'a str> {
    if path == mount {
        return Some("");
    }
    path.strip_prefix(mount)?.strip_prefix('/')
}

/// Mount table mapping roots to absolute path prefixes
///
/// Mounts carry no trailing separator. Removable roots mount at
/// `<removable_mount_base>/<root-id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootLayout {
    pub primary_mount: String,
    pub data_mount: String,
    pub removable_mount_base: String,
}

impl Default for RootLayout {
    fn default() -> Self {
        Self {
            primary_mount: "/storage/emulated/0".to_string(),
            data_mount: "/data/media/0".to_string(),
            removable_mount_base: "/storage".to_string(),
        }
    }
}

impl RootLayout {
    /// Mount prefix for a root; fails for roots this layout cannot place.
    pub fn mount(&self, root: &RootId) -> StorageResult<String> {
        match root.kind() {
            StorageKind::PrimaryExternal => Ok(self.primary_mount.clone()),
            StorageKind::Internal => Ok(self.data_mount.clone()),
            StorageKind::Removable => {
                Ok(format!("{}/{}", self.removable_mount_base, root.as_str()))
            }
            StorageKind::Unknown => Err(StorageError::UnknownRoot(root.to_string())),
        }
    }
}

/// Minimal covering subset of `paths` under the ancestor relation.
///
/// Returns the paths that are not nested beneath any other path in the
/// collection; equal paths collapse to one. Sorting by root and segment
/// sequence first makes a single linear scan sufficient, since every
/// descendant sorts directly into the range after its ancestor. O(n log n).
pub fn find_unique_parents(paths: &[StoragePath]) -> Vec<StoragePath> {
    let mut sorted = paths.to_vec();
    sorted.sort_by(|a, b| {
        a.root
            .as_str()
            .cmp(b.root.as_str())
            .then_with(|| a.segments.cmp(&b.segments))
    });
    sorted.dedup();

    let mut parents: Vec<StoragePath> = Vec::new();
    for path in sorted {
        match parents.last() {
            Some(kept) if kept.covers(&path) => {}
            _ => parents.push(path),
        }
    }
    parents
}
