//! Application configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// How files are placed into the archive tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CopyMode {
    /// Hard link → symlink → byte copy, cascading on failure. Saves space
    /// but ties symlinked entries to the source's lifetime.
    LinkPreferred,
    /// Always a full byte copy; the archive stays self-contained.
    #[default]
    CopyOnly,
}

/// Knobs for the import pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub copy_mode: CopyMode,
    /// Override for the hardware-scaled local worker width
    pub local_workers: Option<usize>,
    /// Worker width whenever either endpoint is network-mounted
    pub network_workers: usize,
    /// Consecutive network-classified copy errors before the session aborts
    pub network_failure_threshold: u32,
    /// Delete archive copies that fail post-copy verification
    pub rollback_invalid: bool,
    /// Path prefixes classified as network storage; empty means built-in
    /// defaults
    pub network_path_markers: Vec<String>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            copy_mode: CopyMode::default(),
            local_workers: None,
            network_workers: 1,
            network_failure_threshold: 5,
            rollback_invalid: true,
            network_path_markers: Vec::new(),
        }
    }
}

/// Main application configuration, stored as TOML in the data directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Root of the managed archive tree
    pub archive_root: PathBuf,

    /// Catalog database path
    pub database_path: PathBuf,

    pub import: ImportSettings,
}

const CONFIG_FILE: &str = "sitevault.toml";

impl VaultConfig {
    /// Load the config from a data directory, creating a default one on
    /// first run.
    pub fn load_or_create(data_dir: &Path, archive_root: Option<PathBuf>) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);

        if config_path.exists() {
            info!("loading config from {:?}", config_path);
            let text = fs::read_to_string(&config_path)?;
            let config: VaultConfig = toml::from_str(&text)?;
            Ok(config)
        } else {
            warn!("no config found, creating default at {:?}", config_path);
            let archive_root =
                archive_root.unwrap_or_else(|| data_dir.join("archive"));
            let config = Self {
                archive_root,
                database_path: data_dir.join("data").join("catalog.db"),
                import: ImportSettings::default(),
            };
            config.save(data_dir)?;
            Ok(config)
        }
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir)?;
        let config_path = data_dir.join(CONFIG_FILE);
        fs::write(&config_path, toml::to_string_pretty(self)?)?;
        info!("saved config to {:?}", config_path);
        Ok(())
    }
}

/// Default data directory for this platform
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|d| d.join("sitevault"))
        .ok_or_else(|| anyhow::anyhow!("could not determine platform data directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let created =
            VaultConfig::load_or_create(dir.path(), Some(PathBuf::from("/archive"))).unwrap();
        assert_eq!(created.archive_root, PathBuf::from("/archive"));
        assert_eq!(created.import.network_failure_threshold, 5);
        assert!(created.import.rollback_invalid);

        // Second load reads the file written by the first
        let loaded = VaultConfig::load_or_create(dir.path(), None).unwrap();
        assert_eq!(loaded.archive_root, created.archive_root);
        assert_eq!(loaded.import.copy_mode, CopyMode::CopyOnly);
    }

    #[test]
    fn partial_settings_fall_back_to_defaults() {
        let settings: ImportSettings = toml::from_str("copy_mode = \"link_preferred\"").unwrap();
        assert_eq!(settings.copy_mode, CopyMode::LinkPreferred);
        assert_eq!(settings.network_workers, 1);
    }
}
