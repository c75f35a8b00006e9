//! Per-renderer state persistence.
//!
//! Renderers may stash a small JSON value (scroll positions, collapsed
//! sections) that survives a webview reload. Keys are renderer ids, so one
//! renderer can never read another's state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::warn;
use serde_json::Value;

/// Keyed JSON storage shared by all renderer contexts.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
}

/// In-memory store for tests and hosts without persistence.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }
}

/// Store backed by a JSON file, written through on every `set`.
pub struct FileStateStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, Value>>,
}

impl FileStateStore {
    /// Read existing state from `path`, falling back to empty on any error.
    pub fn load_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(
                        "[state] ignoring malformed state file {}: {}",
                        path.display(),
                        err
                    );
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, entries: &HashMap<String, Value>) {
        let write = || -> anyhow::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(entries)?;
            std::fs::write(&self.path, contents)?;
            Ok(())
        };
        if let Err(err) = write() {
            warn!(
                "[state] failed to persist state to {}: {:#}",
                self.path.display(),
                err
            );
        }
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), value);
        self.save(&entries);
    }
}

/// Default location for the state file of the standalone host binary.
pub fn default_state_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("renderer-host").join("renderer-state.json"))
}
