//! Selection persistence

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::error::{Result, ResultExt};

/// Key holding the selected paths in the state object
pub const STATE_KEY_SELECTED: &str = "ctxcraft.selectedPaths";

/// Storage for the explicit selection between sessions
pub trait SelectionPersistence: Send + Sync {
    /// Load the stored paths (empty when nothing was stored)
    fn load(&self) -> Result<Vec<PathBuf>>;

    /// Replace the stored paths
    fn save(&self, paths: &[PathBuf]) -> Result<()>;
}

/// JSON key-value state file. Keys other than the selection are preserved.
#[derive(Debug, Clone)]
pub struct JsonStateFile {
    path: PathBuf,
}

impl JsonStateFile {
    /// Use the state file at `path` (created on first save)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_object(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => crate::bail!(
                Config,
                "State file {} does not hold a JSON object",
                self.path.display()
            ),
        }
    }
}

impl SelectionPersistence for JsonStateFile {
    fn load(&self) -> Result<Vec<PathBuf>> {
        let state = self.read_object()?;
        let paths = match state.get(STATE_KEY_SELECTED) {
            Some(value) => serde_json::from_value::<Vec<String>>(value.clone())?,
            None => Vec::new(),
        };
        Ok(paths.into_iter().map(PathBuf::from).collect())
    }

    fn save(&self, paths: &[PathBuf]) -> Result<()> {
        let mut state = self.read_object()?;
        let list: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        state.insert(STATE_KEY_SELECTED.to_string(), serde_json::to_value(list)?);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&Value::Object(state))?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory persistence
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    paths: Mutex<Vec<PathBuf>>,
    saves: Mutex<usize>,
}

impl MemoryPersistence {
    /// Start with `paths` already stored
    pub fn with_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: Mutex::new(paths.into_iter().map(Into::into).collect()),
            saves: Mutex::new(0),
        }
    }

    /// Number of saves so far
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    /// Currently stored paths
    pub fn stored(&self) -> Vec<PathBuf> {
        self.paths.lock().clone()
    }
}

impl SelectionPersistence for MemoryPersistence {
    fn load(&self) -> Result<Vec<PathBuf>> {
        Ok(self.paths.lock().clone())
    }

    fn save(&self, paths: &[PathBuf]) -> Result<()> {
        *self.paths.lock() = paths.to_vec();
        *self.saves.lock() += 1;
        Ok(())
    }
}
