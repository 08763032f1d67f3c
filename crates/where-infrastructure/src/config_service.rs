//! Configuration service implementation.
//!
//! Loads the view-model configuration from `config.toml`, either at an
//! explicit path or under the platform configuration directory
//! (`~/.config/where/config.toml` on Linux).

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use where_core::{Result, WhereConfig, WhereError};

const APP_DIR: &str = "where";
const CONFIG_FILE: &str = "config.toml";

/// Configuration service that loads and caches [`WhereConfig`].
///
/// A missing file yields the defaults. The parsed value is cached until
/// [`ConfigService::invalidate_cache`] is called.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: Option<PathBuf>,
    config: Arc<RwLock<Option<WhereConfig>>>,
}

impl ConfigService {
    /// Uses the platform configuration directory.
    pub fn new() -> Self {
        Self {
            path: None,
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Path of the configuration file.
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
                .ok_or_else(|| WhereError::config("cannot determine the configuration directory")),
        }
    }

    /// Gets the configuration, loading it on first access.
    ///
    /// A file that cannot be read or parsed is logged and the defaults are
    /// used instead.
    pub fn get_config(&self) -> WhereConfig {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("[ConfigService] using default configuration: {}", e);
                WhereConfig::default()
            }
        }
    }

    /// Gets the configuration, surfacing read and parse errors.
    pub fn load(&self) -> Result<WhereConfig> {
        {
            let cached = self
                .config
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let path = self.config_path()?;
        let loaded = Self::read_file(&path)?;

        let mut cached = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cached = Some(loaded.clone());
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut cached = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cached = None;
    }

    /// Writes `config` to the configuration file and caches it.
    pub fn save(&self, config: &WhereConfig) -> Result<()> {
        let path = self.config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, toml::to_string_pretty(config)?)?;
        tracing::info!("[ConfigService] saved configuration to {}", path.display());

        let mut cached = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cached = Some(config.clone());
        Ok(())
    }

    fn read_file(path: &Path) -> Result<WhereConfig> {
        if !path.exists() {
            tracing::debug!(
                "[ConfigService] {} not found, using defaults",
                path.display()
            );
            return Ok(WhereConfig::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        tracing::debug!("[ConfigService] loaded {}", path.display());
        Ok(config)
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}
