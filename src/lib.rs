/*!
 * ctxcraft - Select files and folders as context for LLM prompts
 *
 * This library keeps a persistent tri-state selection over one or more
 * workspace roots, expands it into the non-ignored files it covers, counts
 * their tokens and exports them as an XML bundle.
 */

pub mod collector;
pub mod config;
pub mod debounce;
pub mod error;
pub mod git;
pub mod host;
pub mod ignore_rules;
pub mod ops;
pub mod refresh;
pub mod report;
pub mod selection;
pub mod session;
pub mod tokenizer;
pub mod tree;
pub mod types;
pub mod utils;
pub mod writer;

#[cfg(test)]
mod tests;

// Re-export main components for easier access
pub use config::{Args, Command, Config};
pub use error::{CraftError, Result, ResultExt};
pub use host::{FsHost, LocalFs, MemoryFs};
pub use refresh::{RefreshOutcome, StatusSink};
pub use report::{Reporter, SelectionReport};
pub use selection::{JsonStateFile, MemoryPersistence, SelectionPersistence, SelectionStore};
pub use session::{Export, SeedReport, Session, SessionBuilder, TreeItem};
pub use types::{CheckState, EntryKind, FsEvent, WorkspaceRoot};
pub use utils::{format_file_size, format_status};
pub use writer::XmlWriter;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
