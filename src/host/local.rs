//! Host backed by the real filesystem (tokio::fs)

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use super::FsHost;
use crate::types::{DirEntry, EntryKind, FileStat};

/// Local filesystem host
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    /// Create a new local filesystem host
    pub fn new() -> Self {
        Self
    }
}

fn kind_of(file_type: std::fs::FileType) -> EntryKind {
    if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Unknown
    }
}

#[async_trait]
impl FsHost for LocalFs {
    async fn read_directory(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut reader = tokio::fs::read_dir(path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            // Symlinks are reported as Unknown so callers stat (and follow) them
            let kind = match entry.file_type().await {
                Ok(ft) => kind_of(ft),
                Err(_) => EntryKind::Unknown,
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                kind,
            });
        }
        Ok(entries)
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(FileStat {
            kind: kind_of(metadata.file_type()),
            size: metadata.len(),
            mtime: metadata.modified()?,
        })
    }

    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn read_head(&self, path: &Path, limit: usize) -> io::Result<Vec<u8>> {
        let file = tokio::fs::File::open(path).await?;
        let mut buffer = Vec::with_capacity(limit);
        file.take(limit as u64).read_to_end(&mut buffer).await?;
        Ok(buffer)
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        let metadata = tokio::fs::symlink_metadata(path).await?;
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if tokio::fs::try_exists(to).await? {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", to.display()),
            ));
        }
        tokio::fs::rename(from, to).await
    }
}
