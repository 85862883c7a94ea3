// SPDX-License-Identifier: AGPL-3.0-or-later
//! scopedfs Transfer
//!
//! Drives a single source→destination transfer through validation,
//! conflict resolution, chunked copy and completion or error reporting.
//! The actual byte moving happens behind [`TransferMedium`]; the engine
//! requires a write grant for the destination before it touches I/O.

pub mod engine;
pub mod event;
pub mod local;
pub mod medium;

pub use engine::{CancellationFlag, TransferConfig, TransferEngine, TransferRequest};
pub use event::{SourceFileDeletionResult, TransferErrorCode, TransferEvent};
pub use local::LocalMedium;
pub use medium::{ByteStream, ItemKind, ItemStat, MemoryMedium, TransferMedium};
