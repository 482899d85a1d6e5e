//! The slice of store state that survives restarts.

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const STORAGE_FILE_NAME: &str = "weather-storage.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    pub current_city: String,
    pub favorite_cities: Vec<String>,
}

impl PersistedState {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize persisted weather state")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse persisted weather state")
    }
}

/// Where the persisted blob lives. Writes are last-write-wins.
pub trait StateStorage: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<PersistedState>>;

    fn save(&self, state: &PersistedState) -> Result<()>;
}

/// JSON file on local disk.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `weather-storage.json` in the platform data directory.
    pub fn default_location() -> Result<Self> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform data directory"))?;

        Ok(Self::new(dirs.data_dir().join(STORAGE_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStorage for FileStorage {
    fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;

        PersistedState::from_json(&contents)
            .with_context(|| format!("Corrupt state file: {}", self.path.display()))
            .map(Some)
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory: {}", parent.display())
            })?;
        }

        let json = state.to_json()?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json)
            .with_context(|| format!("Failed to write state file: {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))?;

        Ok(())
    }
}

/// Keeps the blob in memory, serialized, so tests see the same round trip as disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blob: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(json: impl Into<String>) -> Self {
        Self { blob: Mutex::new(Some(json.into())) }
    }

    pub fn blob(&self) -> Option<String> {
        self.blob.lock().clone()
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self) -> Result<Option<PersistedState>> {
        self.blob.lock().as_deref().map(PersistedState::from_json).transpose()
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        *self.blob.lock() = Some(state.to_json()?);
        Ok(())
    }
}
