//! Delete and rename through the host.
//!
//! The selection follows the filesystem only once the host call succeeded.

use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::session::Session;
use crate::utils::normalize_path;

impl Session {
    /// Delete `path` (recursively for folders) and forget its selections
    pub async fn delete_path(&self, path: &Path) -> Result<()> {
        let path = normalize_path(path);
        let root = self.root_for(&path)?;
        crate::ensure!(
            path != root.path,
            InvalidArgument,
            "refusing to delete workspace root {}",
            path.display()
        );

        if let Err(e) = self.host.remove(&path).await {
            warn!("Failed to delete {}: {}", path.display(), e);
            crate::bail!(Operation, "could not delete {}: {}", path.display(), e);
        }

        self.forget_cached(&path);
        let mut store = self.selection.lock().await;
        if store.forget(&path) {
            self.persist(&store)?;
        }
        info!("Deleted {}", path.display());
        Ok(())
    }

    /// Rename or move `from` to `to` and remap its selections
    pub async fn rename_path(&self, from: &Path, to: &Path) -> Result<()> {
        let from = normalize_path(from);
        let to = normalize_path(to);
        let root = self.root_for(&from)?;
        self.root_for(&to)?;
        crate::ensure!(
            from != root.path,
            InvalidArgument,
            "refusing to rename workspace root {}",
            from.display()
        );
        crate::ensure!(
            !to.starts_with(&from),
            InvalidArgument,
            "cannot move {} into itself",
            from.display()
        );

        if let Err(e) = self.host.rename(&from, &to).await {
            warn!(
                "Failed to rename {} to {}: {}",
                from.display(),
                to.display(),
                e
            );
            crate::bail!(
                Operation,
                "could not rename {} to {}: {}",
                from.display(),
                to.display(),
                e
            );
        }

        self.forget_cached(&from);
        self.forget_cached(&to);
        let mut store = self.selection.lock().await;
        if store.rename(&from, &to) {
            self.persist(&store)?;
        }
        info!("Renamed {} to {}", from.display(), to.display());
        Ok(())
    }
}
