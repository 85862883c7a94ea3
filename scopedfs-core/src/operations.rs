// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transfer operation options

use serde::{Deserialize, Serialize};

/// Whether the source survives the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMode {
    Copy,
    Move,
}

/// Rule for handling a pre-existing item at the transfer destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConflictPolicy {
    /// Fail the transfer when the target name is taken.
    #[default]
    Fail,
    /// Delete the conflicting item, then transfer under the original name.
    Replace,
    /// Keep the conflicting item and transfer under a numbered name.
    CreateNew,
}
