/*!
 * Configuration handling for ctxcraft
 */

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;

use crate::collector::{DEFAULT_MAX_FILES, DEFAULT_TRAVERSAL_CONCURRENCY};
use crate::debounce::DEFAULT_DEBOUNCE;
use crate::error::Result;
use crate::tokenizer::{
    Encoding, DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_PREVIEW_BYTES, DEFAULT_TOKEN_CONCURRENCY,
};
use crate::utils::absolutize;

/// Default name of the ignore-rule file looked up in each root
pub const DEFAULT_IGNORE_FILE: &str = ".gitignore";

/// Command-line arguments for ctxcraft
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "ctxcraft",
    version = env!("CARGO_PKG_VERSION"),
    about = "Select files and folders, count their tokens and export them as XML for LLM prompts",
    long_about = "Keeps a persistent tri-state selection over one or more workspace roots, resolves it into the non-ignored files it covers, counts their tokens and exports them as an XML bundle."
)]
pub struct Args {
    /// Workspace root (repeat for a multi-root workspace; defaults to the current directory)
    #[clap(long = "root", short = 'r', global = true)]
    pub roots: Vec<PathBuf>,

    /// Selection state file (defaults to one per workspace under the local data directory)
    #[clap(long, global = true)]
    pub state_file: Option<PathBuf>,

    /// Maximum number of files collected per root
    #[clap(long, global = true, default_value_t = DEFAULT_MAX_FILES)]
    pub max_files: usize,

    /// Files larger than this many bytes are neither counted nor exported
    #[clap(long, global = true, default_value_t = DEFAULT_MAX_PREVIEW_BYTES)]
    pub preview_bytes: u64,

    /// BPE encoding used for token counting
    #[clap(long, global = true, value_enum, default_value_t = Encoding::default())]
    pub encoding: Encoding,

    /// Name of the ignore-rule file in each root
    #[clap(long, global = true, default_value = DEFAULT_IGNORE_FILE)]
    pub ignore_file: String,

    /// Replace fully checked folders by a single folder entry
    #[clap(long, global = true)]
    pub collapse: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check files or folders
    Check {
        /// Paths to check
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Uncheck files or folders
    Uncheck {
        /// Paths to uncheck
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Clear the selection
    Clear,

    /// List the explicit selection
    List {
        /// List the resolved files instead
        #[clap(long)]
        files: bool,
    },

    /// Show the tree with checkbox states
    Tree {
        /// Folder to show (defaults to every root)
        path: Option<PathBuf>,

        /// Levels to expand
        #[clap(long, default_value_t = 2)]
        depth: usize,
    },

    /// Count files and tokens of the selection
    Status,

    /// Export the selected files as XML
    Export {
        /// Write to this file instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// List files changed in git
    GitChanges {
        /// Replace the selection with the changed files
        #[clap(long)]
        seed: bool,
    },

    /// Delete a file or folder
    Rm {
        /// Path to delete
        path: PathBuf,
    },

    /// Rename or move a file or folder
    Mv {
        /// Current path
        from: PathBuf,
        /// New path
        to: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        #[clap(value_enum)]
        shell: Shell,
    },
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Workspace roots (absolute, normalized)
    pub roots: Vec<PathBuf>,

    /// Selection state file
    pub state_file: PathBuf,

    /// Cap on files collected per root in one resolution
    pub max_collected_files: usize,

    /// Outstanding stat/list calls during traversal
    pub traversal_concurrency: usize,

    /// Files counted concurrently
    pub token_concurrency: usize,

    /// Preview ceiling in bytes
    pub max_preview_bytes: u64,

    /// Token count cache capacity
    pub token_cache_capacity: usize,

    /// Binary classification cache capacity
    pub binary_cache_capacity: usize,

    /// Quiet window before a debounced refresh runs
    pub debounce: Duration,

    /// Ignore-rule file name
    pub ignore_file_name: String,

    /// BPE encoding
    pub encoding: Encoding,

    /// Collapse fully checked folders into one entry
    pub collapse_complete_folders: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            state_file: default_state_file(&[]),
            max_collected_files: DEFAULT_MAX_FILES,
            traversal_concurrency: DEFAULT_TRAVERSAL_CONCURRENCY,
            token_concurrency: DEFAULT_TOKEN_CONCURRENCY,
            max_preview_bytes: DEFAULT_MAX_PREVIEW_BYTES,
            token_cache_capacity: DEFAULT_CACHE_CAPACITY,
            binary_cache_capacity: DEFAULT_CACHE_CAPACITY,
            debounce: DEFAULT_DEBOUNCE,
            ignore_file_name: DEFAULT_IGNORE_FILE.to_string(),
            encoding: Encoding::default(),
            collapse_complete_folders: false,
        }
    }
}

impl Config {
    /// Create configuration from command-line arguments. Relative paths are
    /// resolved against `cwd`.
    pub fn from_args(args: &Args, cwd: &Path) -> Self {
        let mut roots: Vec<PathBuf> = args.roots.iter().map(|r| absolutize(r, cwd)).collect();
        if roots.is_empty() {
            roots.push(absolutize(Path::new("."), cwd));
        }
        roots.dedup();

        let state_file = args
            .state_file
            .as_ref()
            .map(|p| absolutize(p, cwd))
            .unwrap_or_else(|| default_state_file(&roots));

        Self {
            roots,
            state_file,
            max_collected_files: args.max_files,
            max_preview_bytes: args.preview_bytes,
            ignore_file_name: args.ignore_file.clone(),
            encoding: args.encoding,
            collapse_complete_folders: args.collapse,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for root in &self.roots {
            crate::ensure!(
                root.is_dir(),
                PathNotFound,
                "workspace root {} is not a directory",
                root.display()
            );
        }
        crate::ensure!(
            self.max_collected_files > 0,
            Config,
            "max files must be at least 1"
        );
        crate::ensure!(
            self.traversal_concurrency > 0 && self.token_concurrency > 0,
            Config,
            "concurrency limits must be at least 1"
        );
        crate::ensure!(
            !self.ignore_file_name.is_empty() && !self.ignore_file_name.contains('/'),
            Config,
            "ignore file name {:?} must be a plain file name",
            self.ignore_file_name
        );
        Ok(())
    }
}

/// Per-workspace state file under the local data directory
pub fn default_state_file(roots: &[PathBuf]) -> PathBuf {
    let base = dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ctxcraft");

    let key = roots
        .iter()
        .map(|r| r.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("+");
    if key.is_empty() {
        return base.join("state.json");
    }

    // One file per workspace, named after its roots
    let sanitized = key.replace(
        |c: char| !c.is_alphanumeric() && c != '_' && c != '-' && c != '.',
        "_",
    );
    base.join(format!("{}.state.json", sanitized))
}
