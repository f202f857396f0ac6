//! Configuration model.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Undo engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    /// Completed transactions kept before the oldest are purged.
    pub max_transactions: usize,
    /// Transactions grouped by a checkpoint created without explicit IDs.
    pub default_checkpoint_size: usize,
    /// State directory, relative to the project root.
    pub state_dir: PathBuf,
    /// Verify backup checksums before restoring.
    pub verify_checksums: bool,
    /// Buffered events per subscriber.
    pub event_capacity: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            max_transactions: 50,
            default_checkpoint_size: 10,
            state_dir: PathBuf::from(".xaheen"),
            verify_checksums: true,
            event_capacity: 256,
        }
    }
}

impl UndoConfig {
    /// Override the history cap.
    pub fn with_max_transactions(mut self, max: usize) -> Self {
        self.max_transactions = max;
        self
    }

    fn validate(&self) -> crate::Result<()> {
        if self.max_transactions == 0 {
            return Err(crate::Error::Config(
                "max_transactions must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(crate::Error::Config(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        if self.state_dir.is_absolute() {
            return Err(crate::Error::Config(
                "state_dir must be relative to the project root".to_string(),
            ));
        }
        Ok(())
    }
}

/// Get the user-level configuration directory path.
fn dirs_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("xaheen")
}

/// Parse and validate a config file.
pub fn read_config(path: &Path) -> crate::Result<UndoConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: UndoConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration for a project.
///
/// Looks at `<project>/.xaheen/config.toml`, then the user config directory,
/// then falls back to defaults.
pub fn load_config(project_root: &Path) -> UndoConfig {
    let candidates = [
        project_root.join(".xaheen").join("config.toml"),
        dirs_config_path().join("config.toml"),
    ];

    for path in candidates.iter().filter(|p| p.exists()) {
        match read_config(path) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                return config;
            }
            Err(e) => {
                tracing::warn!("Ignoring config {:?}: {}", path, e);
            }
        }
    }

    UndoConfig::default()
}
