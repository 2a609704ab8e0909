//! Ignore-rule provider
//!
//! Parses the `.gitignore`-style rule file at the top of each workspace root
//! and keeps the parsed matcher until the file's modification time changes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::host::FsHost;

/// Parsed ignore rules for one root
#[derive(Debug)]
pub struct IgnoreRules {
    matcher: Gitignore,
}

impl IgnoreRules {
    /// Rules that ignore nothing
    pub fn pass_all() -> Self {
        Self {
            matcher: Gitignore::empty(),
        }
    }

    /// Parse rule file contents anchored at `root`
    pub fn parse(root: &Path, contents: &str) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        for line in contents.lines() {
            if let Err(e) = builder.add_line(None, line) {
                debug!("Skipping ignore rule {:?}: {}", line, e);
            }
        }
        match builder.build() {
            Ok(matcher) => Self { matcher },
            Err(e) => {
                warn!("Invalid ignore rules under {}: {}", root.display(), e);
                Self::pass_all()
            }
        }
    }

    /// Whether `rel` is ignored.
    ///
    /// `rel` is `/`-separated and relative to the root. Directories are
    /// queried with a trailing `/` so directory-only rules apply. A path is
    /// also ignored when any of its parent directories is.
    pub fn ignores(&self, rel: &str) -> bool {
        let is_dir = rel.ends_with('/');
        let trimmed = rel.trim_end_matches('/');
        if trimmed.is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(Path::new(trimmed), is_dir)
            .is_ignore()
    }

    /// Number of parsed rules
    pub fn len(&self) -> usize {
        self.matcher.num_ignores() as usize + self.matcher.num_whitelists() as usize
    }

    /// Whether no rule was parsed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct CachedRules {
    mtime: Option<SystemTime>,
    rules: Arc<IgnoreRules>,
}

/// Per-root ignore rules, cached by the rule file's mtime
pub struct IgnoreProvider {
    host: Arc<dyn FsHost>,
    file_name: String,
    cache: Mutex<HashMap<PathBuf, CachedRules>>,
}

impl IgnoreProvider {
    /// Create a provider reading `file_name` at the top of each root
    pub fn new(host: Arc<dyn FsHost>, file_name: impl Into<String>) -> Self {
        Self {
            host,
            file_name: file_name.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Rules for `root`. Unchanged rule files return the cached `Arc`.
    pub async fn get(&self, root: &Path) -> Arc<IgnoreRules> {
        let rule_file = root.join(&self.file_name);
        let mtime = self.host.stat(&rule_file).await.ok().map(|s| s.mtime);

        let cached = self
            .cache
            .lock()
            .get(root)
            .filter(|c| c.mtime == mtime)
            .map(|c| c.rules.clone());
        if let Some(rules) = cached {
            debug!("Ignore rules cache hit for {}", root.display());
            return rules;
        }

        let rules = match mtime {
            Some(_) => match self.host.read_file(&rule_file).await {
                Ok(bytes) => {
                    let rules = IgnoreRules::parse(root, &String::from_utf8_lossy(&bytes));
                    debug!(
                        "Loaded {} ignore rules from {}",
                        rules.len(),
                        rule_file.display()
                    );
                    rules
                }
                Err(e) => {
                    warn!("Cannot read {}: {}", rule_file.display(), e);
                    IgnoreRules::pass_all()
                }
            },
            None => IgnoreRules::pass_all(),
        };

        let rules = Arc::new(rules);
        self.cache.lock().insert(
            root.to_path_buf(),
            CachedRules {
                mtime,
                rules: rules.clone(),
            },
        );
        rules
    }

    /// Drop the cached rules of `root`
    pub fn invalidate(&self, root: &Path) {
        self.cache.lock().remove(root);
    }

    /// Name of the rule file looked up in each root
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryFs;

    #[test]
    fn test_directory_rules_need_trailing_slash() {
        let rules = IgnoreRules::parse(Path::new("/p"), "ignored.txt\nsubdir/\n");
        assert!(rules.ignores("ignored.txt"));
        assert!(rules.ignores("nested/ignored.txt"));
        assert!(rules.ignores("subdir/"));
        assert!(!rules.ignores("subdir"));
        assert!(rules.ignores("subdir/inner.txt"));
        assert!(!rules.ignores("kept.txt"));
        assert!(!rules.ignores(""));
    }

    #[test]
    fn test_negation_and_anchoring() {
        let rules = IgnoreRules::parse(Path::new("/p"), "*.log\n!keep.log\n/build\n");
        assert!(rules.ignores("a.log"));
        assert!(!rules.ignores("keep.log"));
        assert!(rules.ignores("build/"));
        assert!(!rules.ignores("src/build/"));
    }

    #[tokio::test]
    async fn test_missing_file_passes_everything() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_dir("/p");
        let provider = IgnoreProvider::new(fs, ".gitignore");
        let rules = provider.get(Path::new("/p")).await;
        assert!(rules.is_empty());
        assert!(!rules.ignores("anything.txt"));
    }

    #[tokio::test]
    async fn test_cache_keyed_on_mtime() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/p/.gitignore", "a.txt\n");
        let provider = IgnoreProvider::new(fs.clone(), ".gitignore");

        let first = provider.get(Path::new("/p")).await;
        let second = provider.get(Path::new("/p")).await;
        assert!(Arc::ptr_eq(&first, &second));

        fs.add_file("/p/.gitignore", "b.txt\n");
        let third = provider.get(Path::new("/p")).await;
        assert!(!Arc::ptr_eq(&first, &third));
        assert!(third.ignores("b.txt"));
        assert!(!third.ignores("a.txt"));
    }
}
