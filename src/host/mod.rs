//! Filesystem host abstraction
//!
//! Everything the engine knows about the tree comes through [`FsHost`]:
//! listings, stats and reads are suspension points, never pure lookups.

mod local;
mod memory;

pub use local::LocalFs;
pub use memory::MemoryFs;

use std::io;
use std::path::Path;

use async_trait::async_trait;

use crate::types::{DirEntry, FileStat};

/// Trait for the filesystem operations the engine consumes
#[async_trait]
pub trait FsHost: Send + Sync {
    /// List the direct children of a directory
    async fn read_directory(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Stat a path, following symlinks
    async fn stat(&self, path: &Path) -> io::Result<FileStat>;

    /// Read a whole file
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Read at most `limit` bytes from the start of a file
    async fn read_head(&self, path: &Path, limit: usize) -> io::Result<Vec<u8>> {
        let mut bytes = self.read_file(path).await?;
        bytes.truncate(limit);
        Ok(bytes)
    }

    /// Delete a file or a directory tree
    async fn remove(&self, path: &Path) -> io::Result<()>;

    /// Rename (move) a path
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}
