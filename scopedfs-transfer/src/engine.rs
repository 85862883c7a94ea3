// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transfer engine
//!
//! Drives one file transfer through `Validating -> Preparing ->
//! [DeletingConflictedFile] -> InProgress* -> Completed | Error`. Events
//! flow through an unbounded channel to a single consumer; the terminal
//! event is always delivered. Cancellation is cooperative and checked
//! between chunks, never mid-I/O.

use crate::event::{SourceFileDeletionResult, TransferEvent};
use crate::medium::{ItemKind, ItemStat, TransferMedium};
use futures::StreamExt;
use scopedfs_core::{ConflictPolicy, StorageError, StoragePath, StorageResult, TransferMode};
use scopedfs_grants::CapabilityRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Minimum time between `InProgress` emissions. A policy knob, not part
    /// of the correctness contract.
    pub progress_interval: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_millis(500),
        }
    }
}

/// One requested source→destination transfer
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source: StoragePath,
    pub target_folder: StoragePath,
    /// Name of the resulting file; defaults to the source name.
    pub target_name: Option<String>,
    pub mode: TransferMode,
    pub on_conflict: ConflictPolicy,
}

impl TransferRequest {
    pub fn new(source: StoragePath, target_folder: StoragePath, mode: TransferMode) -> Self {
        Self {
            source,
            target_folder,
            target_name: None,
            mode,
            on_conflict: ConflictPolicy::default(),
        }
    }

    pub fn with_target_name(mut self, name: impl Into<String>) -> Self {
        self.target_name = Some(name.into());
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.on_conflict = policy;
        self
    }
}

/// Cooperative cancellation signal, checked between I/O chunks
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Single-file transfer engine
#[derive(Clone)]
pub struct TransferEngine {
    medium: Arc<dyn TransferMedium>,
    registry: Arc<CapabilityRegistry>,
    config: TransferConfig,
}

impl TransferEngine {
    pub fn new(medium: Arc<dyn TransferMedium>, registry: Arc<CapabilityRegistry>) -> Self {
        Self::with_config(medium, registry, TransferConfig::default())
    }

    pub fn with_config(
        medium: Arc<dyn TransferMedium>,
        registry: Arc<CapabilityRegistry>,
        config: TransferConfig,
    ) -> Self {
        Self {
            medium,
            registry,
            config,
        }
    }

    /// Run the transfer on the current runtime, returning the event stream.
    pub fn spawn(
        &self,
        request: TransferRequest,
        cancel: CancellationFlag,
    ) -> UnboundedReceiver<TransferEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = self.clone();
        tokio::spawn(async move {
            engine.run(request, cancel, tx).await;
        });
        rx
    }

    /// Drive the transfer to its terminal state, emitting events along the
    /// way. The terminal event is both sent and returned.
    pub async fn run(
        &self,
        request: TransferRequest,
        cancel: CancellationFlag,
        events: UnboundedSender<TransferEvent>,
    ) -> TransferEvent {
        let terminal = match self.drive(&request, &cancel, &events).await {
            Ok(completed) => completed,
            Err(e) => TransferEvent::Error {
                code: (&e).into(),
                message: Some(e.to_string()),
            },
        };
        let _ = events.send(terminal.clone());
        terminal
    }

    async fn drive(
        &self,
        req: &TransferRequest,
        cancel: &CancellationFlag,
        events: &UnboundedSender<TransferEvent>,
    ) -> StorageResult<TransferEvent> {
        let _ = events.send(TransferEvent::Validating);
        if cancel.is_canceled() {
            return Err(StorageError::Canceled);
        }

        let src_stat = self
            .medium
            .stat(&req.source)
            .await?
            .filter(ItemStat::is_file)
            .ok_or_else(|| StorageError::SourceNotFound(req.source.to_string()))?;

        match self.medium.stat(&req.target_folder).await? {
            Some(stat) if !stat.is_file() => {}
            _ => {
                return Err(StorageError::TargetFolderNotFound(
                    req.target_folder.to_string(),
                ))
            }
        }

        let name = req
            .target_name
            .clone()
            .or_else(|| req.source.name().map(String::from))
            .ok_or_else(|| StorageError::InvalidPath(req.source.to_string()))?;
        let target = req.target_folder.join(&name);

        // Self-overwrite and self-containment both fail here, before any
        // conflict handling can delete anything.
        if req.source.covers(&target) || target.covers(&req.source) {
            return Err(StorageError::TargetSharesSourcePath(target.to_string()));
        }

        if !self.registry.covers_write(&target).await? {
            return Err(StorageError::PermissionDenied(target.to_string()));
        }

        // Preparing: resolve the final destination and the byte total.
        let mut target = target;
        let mut delete_conflict: Option<ItemKind> = None;
        if let Some(existing) = self.medium.stat(&target).await? {
            match req.on_conflict {
                ConflictPolicy::Replace => delete_conflict = Some(existing.kind),
                ConflictPolicy::Fail => {
                    return Err(StorageError::CannotCreateTarget(target.to_string()))
                }
                ConflictPolicy::CreateNew => {
                    target = self.next_available(&req.target_folder, &name).await?;
                }
            }
        }
        let total_bytes = src_stat.size;
        let _ = events.send(TransferEvent::Preparing { total_bytes });

        if let Some(kind) = delete_conflict {
            let _ = events.send(TransferEvent::DeletingConflictedFile);
            if let Err(e) = self.medium.delete(&target).await {
                return Err(match (kind, e) {
                    (_, e @ StorageError::PermissionDenied(_)) => e,
                    (ItemKind::Folder, _) => {
                        StorageError::TargetFolderNotFound(target.to_string())
                    }
                    (ItemKind::File, _) => StorageError::TargetFileNotFound(target.to_string()),
                });
            }
        }

        self.medium.create_file(&target).await?;
        let mut stream = self.medium.read_file(&req.source).await?;
        let mut bytes_moved: u64 = 0;
        let mut last_emit = Instant::now();
        let mut bytes_at_last_emit: u64 = 0;

        while let Some(chunk) = stream.next().await {
            if cancel.is_canceled() {
                self.discard_partial(&target).await;
                return Err(StorageError::Canceled);
            }
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.discard_partial(&target).await;
                    return Err(normalize_space(e, &target));
                }
            };
            let written = match self.medium.append_chunk(&target, chunk).await {
                Ok(written) => written,
                Err(e) => {
                    self.discard_partial(&target).await;
                    return Err(normalize_space(e, &target));
                }
            };
            bytes_moved += written;

            if last_emit.elapsed() >= self.config.progress_interval {
                let elapsed = last_emit.elapsed().as_secs_f64().max(1e-6);
                let write_speed = ((bytes_moved - bytes_at_last_emit) as f64 / elapsed) as u64;
                let _ = events.send(TransferEvent::InProgress {
                    progress: progress_of(bytes_moved, total_bytes),
                    bytes_moved,
                    write_speed,
                });
                last_emit = Instant::now();
                bytes_at_last_emit = bytes_moved;
            }
        }

        // Final progress emission so the consumer always sees the end of
        // the copy even under a long cadence.
        let _ = events.send(TransferEvent::InProgress {
            progress: progress_of(bytes_moved, total_bytes),
            bytes_moved,
            write_speed: 0,
        });

        let source_deletion = match req.mode {
            TransferMode::Copy => None,
            TransferMode::Move => {
                let deleted = match self.medium.delete(&req.source).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            source = %req.source,
                            error = %e,
                            "copy succeeded but source deletion failed"
                        );
                        false
                    }
                };
                Some(SourceFileDeletionResult::from_success(deleted))
            }
        };

        Ok(TransferEvent::Completed {
            file: target,
            source_deletion,
        })
    }

    /// First free numbered variant of `name` in `folder`, e.g. `it (1).mkv`.
    async fn next_available(
        &self,
        folder: &StoragePath,
        name: &str,
    ) -> StorageResult<StoragePath> {
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (name, None),
        };
        let mut n = 1u32;
        loop {
            let candidate = match ext {
                Some(ext) => folder.join(format!("{} ({}).{}", stem, n, ext)),
                None => folder.join(format!("{} ({})", stem, n)),
            };
            if self.medium.stat(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// A failed or canceled transfer never leaves partial bytes at the
    /// target.
    async fn discard_partial(&self, target: &StoragePath) {
        if let Err(e) = self.medium.delete(target).await {
            tracing::debug!(target = %target, error = %e, "could not discard partial target");
        }
    }
}

fn progress_of(bytes_moved: u64, total_bytes: u64) -> f32 {
    if total_bytes == 0 {
        return 100.0;
    }
    ((bytes_moved as f64) * 100.0 / total_bytes as f64).min(100.0) as f32
}

fn normalize_space(e: StorageError, target: &StoragePath) -> StorageError {
    if e.is_out_of_space() {
        StorageError::NoSpaceLeft(target.to_string())
    } else {
        e
    }
}
