// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz target for StoragePath parsing and manipulation

#![no_main]

use libfuzzer_sys::fuzz_target;
use scopedfs_core::{find_unique_parents, RootId, RootLayout, StorageKind, StoragePath};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let layout = RootLayout::default();

        // Classification is total for any token.
        let _ = StorageKind::classify(&RootId::new(input));

        // Simple-notation and absolute parsing must never panic.
        let _ = StoragePath::parse(input);
        let _ = StoragePath::from_absolute(&layout, input);

        if let Some((root, relative)) = input.split_once(':') {
            let path = StoragePath::new(root, relative);

            let _ = path.relative_path();
            let _ = path.name();
            let _ = path.parent();
            let _ = path.is_root();
            let _ = path.kind();

            // Absolute form round-trips when the root is placeable.
            if let Ok(absolute) = path.to_absolute(&layout) {
                if let Some(parsed) = StoragePath::from_absolute(&layout, &absolute) {
                    assert_eq!(parsed, path);
                }
            }

            // A joined path is always covered by its base, and unique-parents
            // over the pair collapses to the base alone.
            if let Some(extra) = input.get(..10) {
                let joined = path.join(extra);
                if path.is_ancestor_of(&joined) || path == joined {
                    let parents = find_unique_parents(&[path.clone(), joined]);
                    assert_eq!(parents, vec![path]);
                }
            }
        }
    }
});
