// Persisted user preferences

use eyre::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const PREFS_FILE: &str = "prefs.yaml";

/// User preferences stored next to the database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub is_dark_mode: bool,
}

impl Preferences {
    /// Path of the preferences file inside a store directory
    pub fn path_in(store_dir: &Path) -> PathBuf {
        store_dir.join(PREFS_FILE)
    }

    /// Load preferences, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "No preferences file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read preferences")?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let prefs = serde_yaml::from_str(&content).context("Failed to parse preferences")?;
        Ok(prefs)
    }

    /// Write preferences, holding an exclusive lock while the file is replaced
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create preferences directory")?;
        }

        let yaml = serde_yaml::to_string(self).context("Failed to serialize preferences")?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .context("Failed to open preferences file")?;

        file.lock_exclusive().context("Failed to acquire file lock")?;
        file.set_len(0)?;
        file.write_all(yaml.as_bytes())?;
        file.sync_all()?;

        debug!(path = ?path, dark = self.is_dark_mode, "Saved preferences");
        Ok(())
    }
}
