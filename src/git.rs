/*!
 * Git change listing
 *
 * Supplies the changed files of the repository containing a workspace root
 * as candidates for seeding the selection.
 */

use std::path::{Path, PathBuf};

use git2::{Repository, StatusOptions};
use tracing::debug;

use crate::error::Result;
use crate::utils::normalize_path;

/// Absolute paths of the working-tree, index and untracked changes of the
/// repository discovered from `root`. Ignored files are left out.
pub fn changed_paths(root: &Path) -> Result<Vec<PathBuf>> {
    let repo = Repository::discover(root)?;
    let Some(workdir) = repo.workdir() else {
        crate::bail!(
            InvalidArgument,
            "repository at {} has no working tree",
            repo.path().display()
        );
    };
    let workdir = workdir.to_path_buf();

    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false)
        .renames_head_to_index(true);

    let statuses = repo.statuses(Some(&mut options))?;
    let mut paths: Vec<PathBuf> = statuses
        .iter()
        .filter(|entry| !entry.status().is_ignored())
        .filter_map(|entry| entry.path().map(|p| normalize_path(&workdir.join(p))))
        .collect();
    paths.sort();
    paths.dedup();

    debug!(
        "{} changed paths in repository at {}",
        paths.len(),
        workdir.display()
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_lists_modified_and_untracked() -> Result<()> {
        let temp_dir = tempdir()?;
        let root = temp_dir.path();
        let repo = Repository::init(root)?;

        fs::write(root.join("tracked.txt"), "one")?;
        fs::write(root.join("clean.txt"), "clean")?;
        fs::write(root.join(".gitignore"), "*.log\n")?;
        let mut index = repo.index()?;
        index.add_path(Path::new("tracked.txt"))?;
        index.add_path(Path::new("clean.txt"))?;
        index.add_path(Path::new(".gitignore"))?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let signature = git2::Signature::now("ctxcraft", "ctxcraft@example.com")?;
        repo.commit(Some("HEAD"), &signature, &signature, "init", &tree, &[])?;

        fs::write(root.join("tracked.txt"), "two")?;
        fs::create_dir(root.join("new"))?;
        fs::write(root.join("new/fresh.rs"), "fn f() {}")?;
        fs::write(root.join("debug.log"), "noise")?;

        let workdir = normalize_path(repo.workdir().unwrap());
        let changed = changed_paths(root)?;
        assert_eq!(
            changed,
            vec![workdir.join("new/fresh.rs"), workdir.join("tracked.txt")]
        );
        Ok(())
    }

    #[test]
    fn test_outside_repository_is_an_error() -> Result<()> {
        let temp_dir = tempdir()?;
        // May still discover a repository above the temp dir, so only
        // assert when discovery fails.
        if Repository::discover(temp_dir.path()).is_err() {
            assert!(changed_paths(temp_dir.path()).is_err());
        }
        Ok(())
    }
}
