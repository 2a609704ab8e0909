/*!
 * Utility functions for ctxcraft
 */

use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. Symlinks are not resolved and case is preserved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Make `path` absolute against `base` (if needed) and normalize it
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&base.join(path))
    }
}

/// Whether `path` lies strictly below `ancestor` (component-wise)
pub fn is_strict_descendant(path: &Path, ancestor: &Path) -> bool {
    path != ancestor && path.starts_with(ancestor)
}

/// Path of `path` relative to `root`, `/`-separated. `None` when `path` is not
/// inside `root`; an empty string for the root itself.
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

/// Format a number with thousands separators (`12,345`)
pub fn format_count(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Status line text: `3 files | 1,204 tokens`
pub fn format_status(files: usize, tokens: usize) -> String {
    format!(
        "{} file{} | {} tokens",
        files,
        if files == 1 { "" } else { "s" },
        format_count(tokens)
    )
}

/// Format a human-readable file size
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

/// Directory names whose watcher events never affect the selection
pub static WATCHER_IGNORED_DIRS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        ".git",
        "node_modules",
        ".vscode",
        "dist",
        "build",
        "out",
        "target",
        ".next",
        ".nuxt",
    ]
});

/// Whether a watcher event for `path` should be dropped
pub fn is_watcher_noise(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => WATCHER_IGNORED_DIRS
            .iter()
            .any(|ignored| name == std::ffi::OsStr::new(ignored)),
        _ => false,
    })
}
