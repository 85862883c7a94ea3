// SPDX-License-Identifier: AGPL-3.0-or-later
//! Local filesystem transfer medium

use crate::medium::{ByteStream, ItemKind, ItemStat, TransferMedium};
use async_trait::async_trait;
use bytes::Bytes;
use scopedfs_core::{RootLayout, StorageError, StoragePath, StorageResult};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const READ_CHUNK: usize = 64 * 1024;

/// Transfer medium over real mounts described by a [`RootLayout`]
pub struct LocalMedium {
    layout: RootLayout,
}

impl LocalMedium {
    pub fn new(layout: RootLayout) -> Self {
        Self { layout }
    }

    fn real(&self, path: &StoragePath) -> StorageResult<PathBuf> {
        Ok(PathBuf::from(path.to_absolute(&self.layout)?))
    }
}

fn map_write_err(e: std::io::Error, path: &StoragePath) -> StorageError {
    // ENOSPC
    if e.raw_os_error() == Some(28) {
        StorageError::NoSpaceLeft(path.to_string())
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl TransferMedium for LocalMedium {
    async fn stat(&self, path: &StoragePath) -> StorageResult<Option<ItemStat>> {
        let real = self.real(path)?;
        let meta = match fs::metadata(&real).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let kind = if meta.is_dir() {
            ItemKind::Folder
        } else {
            ItemKind::File
        };
        Ok(Some(ItemStat {
            kind,
            size: if meta.is_dir() { 0 } else { meta.len() },
            modified: meta.modified().ok().map(Into::into),
        }))
    }

    async fn read_file(&self, path: &StoragePath) -> StorageResult<ByteStream> {
        let real = self.real(path)?;
        let file = fs::File::open(&real)
            .await
            .map_err(|_| StorageError::SourceNotFound(path.to_string()))?;
        let stream = futures::stream::try_unfold(file, |mut file| async move {
            let mut buf = vec![0u8; READ_CHUNK];
            let n = file.read(&mut buf).await.map_err(StorageError::from)?;
            if n == 0 {
                Ok(None)
            } else {
                buf.truncate(n);
                Ok(Some((Bytes::from(buf), file)))
            }
        });
        Ok(Box::pin(stream))
    }

    async fn create_file(&self, path: &StoragePath) -> StorageResult<()> {
        let real = self.real(path)?;
        match fs::File::create(&real).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::CannotCreateTarget(path.to_string()))
            }
            Err(e) => Err(map_write_err(e, path)),
        }
    }

    async fn append_chunk(&self, path: &StoragePath, chunk: Bytes) -> StorageResult<u64> {
        let real = self.real(path)?;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&real)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    StorageError::TargetFileNotFound(path.to_string())
                }
                _ => StorageError::Io(e),
            })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| map_write_err(e, path))?;
        Ok(chunk.len() as u64)
    }

    async fn delete(&self, path: &StoragePath) -> StorageResult<()> {
        let real = self.real(path)?;
        let meta = match fs::metadata(&real).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::TargetFileNotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            fs::remove_dir_all(&real).await?;
        } else {
            fs::remove_file(&real).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn layout(dir: &tempfile::TempDir) -> RootLayout {
        RootLayout {
            primary_mount: dir.path().to_string_lossy().into_owned(),
            data_mount: dir.path().join("data").to_string_lossy().into_owned(),
            removable_mount_base: dir.path().join("removable").to_string_lossy().into_owned(),
        }
    }

    fn path(s: &str) -> StoragePath {
        StoragePath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_stat_and_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let medium = LocalMedium::new(layout(&dir));

        let stat = medium.stat(&path("primary:a.txt")).await.unwrap().unwrap();
        assert!(stat.is_file());
        assert_eq!(stat.size, 5);
        assert!(medium.stat(&path("primary:gone")).await.unwrap().is_none());

        let mut stream = medium.read_file(&path("primary:a.txt")).await.unwrap();
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_create_append_delete() {
        let dir = tempfile::tempdir().unwrap();
        let medium = LocalMedium::new(layout(&dir));

        medium.create_file(&path("primary:out.bin")).await.unwrap();
        medium
            .append_chunk(&path("primary:out.bin"), Bytes::from_static(b"ab"))
            .await
            .unwrap();
        medium
            .append_chunk(&path("primary:out.bin"), Bytes::from_static(b"cd"))
            .await
            .unwrap();
        assert_eq!(std::fs::read(dir.path().join("out.bin")).unwrap(), b"abcd");

        medium.delete(&path("primary:out.bin")).await.unwrap();
        assert!(medium.stat(&path("primary:out.bin")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_in_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let medium = LocalMedium::new(layout(&dir));
        let err = medium
            .create_file(&path("primary:missing/out.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::CannotCreateTarget(_)));
    }
}
