//! Toggle protocol
//!
//! One checkbox toggle: update the explicit set around the target, promote
//! siblings out of any explicit ancestor, then walk up to the workspace root
//! fixing each folder's explicit membership from its children's coverage.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::trace;

use super::SelectionStore;
use crate::tree::TreeSource;
use crate::types::CheckState;

/// How much of a folder is covered by the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// Every direct child is covered
    Full,
    /// Some children are covered
    Partial,
    /// Nothing is covered (or the folder is empty)
    None,
}

/// Apply one toggle to `store`. `root` is the workspace root containing
/// `target`. Returns whether the explicit set changed.
///
/// With `collapse` set, a folder whose children all end up covered becomes
/// the explicit entry in place of its descendants.
pub async fn toggle(
    store: &mut SelectionStore,
    tree: &dyn TreeSource,
    root: &Path,
    target: &Path,
    checked: bool,
    collapse: bool,
) -> bool {
    let before = store.revision();
    let ancestors = store.explicit_ancestors(target);

    store.remove_descendants(target);
    for ancestor in &ancestors {
        store.remove(ancestor);
        promote_siblings(store, tree, ancestor, target).await;
    }
    if checked {
        store.insert(target);
    } else {
        store.remove(target);
    }

    rebalance(store, tree, root, target, collapse).await;
    trace!(
        "Toggled {} to {}: {} explicit entries",
        target.display(),
        checked,
        store.len()
    );
    store.revision() != before
}

/// Make explicit every path covered by `ancestor` except the branch leading
/// to `target`. Walks down one level at a time, so nested targets promote the
/// siblings at every level in between.
async fn promote_siblings(
    store: &mut SelectionStore,
    tree: &dyn TreeSource,
    ancestor: &Path,
    target: &Path,
) {
    let Ok(rest) = target.strip_prefix(ancestor) else {
        return;
    };
    let mut cursor = ancestor.to_path_buf();
    for component in rest.components() {
        let next = cursor.join(component);
        for child in tree.children(&cursor).await {
            if child != next {
                store.insert(child);
            }
        }
        cursor = next;
    }
}

/// Walk from `target`'s parent up to `root`, dropping stale folder entries
async fn rebalance(
    store: &mut SelectionStore,
    tree: &dyn TreeSource,
    root: &Path,
    target: &Path,
    collapse: bool,
) {
    let mut cursor: Option<PathBuf> = target.parent().map(Path::to_path_buf);
    while let Some(folder) = cursor {
        if !folder.starts_with(root) {
            break;
        }
        match folder_coverage(store, tree, &folder).await {
            Coverage::Full => {
                if collapse {
                    store.remove_descendants(&folder);
                    store.insert(folder.clone());
                }
            }
            Coverage::Partial | Coverage::None => {
                store.remove(&folder);
            }
        }
        if folder == root {
            break;
        }
        cursor = folder.parent().map(Path::to_path_buf);
    }
}

/// Coverage of `folder` computed from its direct children. Children that are
/// neither covered nor hold explicit descendants count as uncovered without
/// being listed.
pub fn folder_coverage<'a>(
    store: &'a SelectionStore,
    tree: &'a dyn TreeSource,
    folder: &'a Path,
) -> BoxFuture<'a, Coverage> {
    async move {
        let children = tree.children(folder).await;
        if children.is_empty() {
            return Coverage::None;
        }

        let mut full = 0;
        let mut touched = 0;
        for child in &children {
            if store.is_effectively_checked(child) {
                full += 1;
                touched += 1;
            } else if store.has_explicit_descendant(child) {
                touched += 1;
                if folder_coverage(store, tree, child).await == Coverage::Full {
                    full += 1;
                }
            }
        }

        if full == children.len() {
            Coverage::Full
        } else if touched == 0 {
            Coverage::None
        } else {
            Coverage::Partial
        }
    }
    .boxed()
}

/// Tri-state of `path`, derived from the explicit set
pub async fn check_state(
    store: &SelectionStore,
    tree: &dyn TreeSource,
    path: &Path,
) -> CheckState {
    if store.is_effectively_checked(path) {
        return CheckState::Checked;
    }
    if !store.has_explicit_descendant(path) {
        return CheckState::Unchecked;
    }
    match folder_coverage(store, tree, path).await {
        Coverage::Full => CheckState::Checked,
        Coverage::Partial => CheckState::Partial,
        Coverage::None => CheckState::Unchecked,
    }
}
