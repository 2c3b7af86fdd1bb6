//! Application configuration
//!
//! The configuration lives in a single TOML file. [`ConfigStore`] finds it
//! (next to the executable first, then in the OS config directory), loads it,
//! creates it with defaults when missing, and reloads it whenever its
//! modification time changes.

use crate::paths::AppPaths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub loader: LoaderConfig,
    pub engine: EngineConfig,
    pub python: PythonConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Raw directory list: one directory per line, `#` comments allowed
    pub directories: String,
    /// Reload a tracked module when its file's mtime changes (opt-in)
    pub reload_modified: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            directories: "# One command module directory per line.\n".to_string(),
            reload_modified: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Speech engine backend name, or "auto"
    pub name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PythonConfig {
    /// Interpreter binary; empty means `$VOXSHELL_PYTHON` or the platform default
    pub interpreter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Maximum number of records kept by the log console
    pub console_capacity: usize,
    /// Export the log console to this CSV file on shutdown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_path: Option<PathBuf>,
    /// Per-target level overrides
    pub targets: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut targets = BTreeMap::new();
        targets.insert("module.stderr".to_string(), "info".to_string());
        Self {
            level: "info".to_string(),
            console_capacity: 5000,
            export_path: None,
            targets,
        }
    }
}

/// Candidate config file locations, in search order
#[derive(Debug, Clone)]
pub struct ConfigLocations {
    pub local: Option<PathBuf>,
    pub system: PathBuf,
}

impl ConfigLocations {
    pub fn from_paths(paths: &AppPaths) -> Self {
        Self {
            local: paths.local_config_file(),
            system: paths.system_config_file(),
        }
    }
}

/// Owns the current configuration snapshot and its backing file
#[derive(Debug)]
pub struct ConfigStore {
    locations: ConfigLocations,
    found_path: Option<PathBuf>,
    load_time: Option<SystemTime>,
    config: AppConfig,
}

impl ConfigStore {
    pub fn new(locations: ConfigLocations) -> Self {
        Self {
            locations,
            found_path: None,
            load_time: None,
            config: AppConfig::default(),
        }
    }

    /// Current configuration snapshot
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Whether a config file has been read or written yet
    pub fn is_loaded(&self) -> bool {
        self.load_time.is_some()
    }

    /// Replace the in-memory configuration (saved with [`ConfigStore::save`])
    pub fn set_config(&mut self, config: AppConfig) {
        self.config = config;
    }

    /// Absolute path of the config file
    ///
    /// The first successful lookup is remembered: once a file has been
    /// chosen, later lookups return it even if a file appears elsewhere.
    pub fn get_config_path(&mut self) -> PathBuf {
        if let Some(path) = &self.found_path {
            return path.clone();
        }

        if let Some(local) = &self.locations.local {
            if local.is_file() {
                self.found_path = Some(local.clone());
                return local.clone();
            }
        }

        let system = self.locations.system.clone();
        self.found_path = Some(system.clone());
        system
    }

    /// Reset to the built-in default configuration
    pub fn load_default(&mut self) {
        log::debug!("Loading default config.");
        self.config = AppConfig::default();
    }

    /// Load configuration from file, if present
    ///
    /// Returns `Ok(false)` when the file does not exist.
    pub fn load(&mut self) -> Result<bool, ConfigError> {
        let path = self.get_config_path();
        log::info!("Loading config from {}.", path.display());

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("Config file ({}) not found.", path.display());
                return Ok(false);
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        let modified = modified_time(&path)?;
        match toml::from_str::<AppConfig>(&content) {
            Ok(config) => {
                self.config = config;
                self.load_time = Some(modified);
                Ok(true)
            }
            Err(source) => {
                // Degrade to defaults, but remember the mtime so the same
                // broken file is reported once.
                self.config = AppConfig::default();
                self.load_time = Some(modified);
                Err(ConfigError::Parse { path, source })
            }
        }
    }

    /// Save current configuration to disk, creating its directory if needed
    pub fn save(&mut self) -> Result<(), ConfigError> {
        let path = self.get_config_path();
        log::info!("Saving config to {}.", path.display());

        if let Some(dir) = path.parent() {
            if !dir.is_dir() {
                log::warn!("Creating config directory ({}).", dir.display());
                fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }

        let toml_str = toml::to_string_pretty(&self.config)?;
        fs::write(&path, toml_str).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        self.load_time = Some(modified_time(&path)?);
        Ok(())
    }

    /// Load configuration from file, or create it with defaults if not found
    pub fn load_or_create(&mut self) -> Result<(), ConfigError> {
        if self.load()? {
            return Ok(());
        }
        self.load_default();
        self.save()
    }

    /// Reload configuration if its file has been modified since last load
    ///
    /// Returns `Ok(true)` when the configuration was (re)loaded. The first
    /// call always loads. A deleted file is recreated with defaults. A parse
    /// error leaves the default configuration in place and is returned.
    pub fn reload_if_modified(&mut self) -> Result<bool, ConfigError> {
        let Some(load_time) = self.load_time else {
            self.load_or_create()?;
            return Ok(true);
        };

        let path = self.get_config_path();
        match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) if modified == load_time => return Ok(false),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(ConfigError::Io { path, source }),
        }

        self.load_or_create()?;
        Ok(true)
    }
}

fn modified_time(path: &Path) -> Result<SystemTime, ConfigError> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
}
