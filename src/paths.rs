use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::PathBuf;

/// Name of the configuration file, both next to the executable and in the
/// OS config directory.
pub const CONFIG_FILE_NAME: &str = "voxshell.toml";

/// Application paths following OS conventions
#[derive(Clone, Debug)]
pub struct AppPaths {
    /// Configuration directory (voxshell.toml)
    pub config: PathBuf,
    /// Data directory (exported logs)
    pub data: PathBuf,
    /// Cache directory (logs)
    pub cache: PathBuf,
    /// Directory holding the running executable, if it can be determined
    pub local: Option<PathBuf>,
}

impl AppPaths {
    /// Resolve OS-specific paths for Voxshell
    ///
    /// # Platform Paths
    ///
    /// ## Linux
    /// - Config: `~/.config/voxshell/`
    /// - Data: `~/.local/share/voxshell/`
    /// - Cache: `~/.cache/voxshell/` → logs/
    ///
    /// ## macOS
    /// - Config: `~/Library/Application Support/org.Voxshell.Voxshell/`
    /// - Cache: `~/Library/Caches/org.Voxshell.Voxshell/`
    ///
    /// ## Windows
    /// - Config: `%APPDATA%\Voxshell\Voxshell\config\`
    /// - Data: `%APPDATA%\Voxshell\Voxshell\data\`
    /// - Cache: `%LOCALAPPDATA%\Voxshell\Voxshell\cache\`
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("org", "Voxshell", "Voxshell")
            .context("Failed to determine project directories")?;

        let local = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()));

        Ok(Self {
            config: proj_dirs.config_dir().to_path_buf(),
            data: proj_dirs.data_dir().to_path_buf(),
            cache: proj_dirs.cache_dir().to_path_buf(),
            local,
        })
    }

    /// Build paths rooted under a single base directory (tests, portable installs)
    pub fn rooted(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            config: base.join("config"),
            data: base.join("data"),
            cache: base.join("cache"),
            local: Some(base.join("local")),
        }
    }

    /// Create all necessary directories
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.config).context("Failed to create config directory")?;
        fs::create_dir_all(&self.data).context("Failed to create data directory")?;
        fs::create_dir_all(self.logs_dir()).context("Failed to create logs directory")?;

        log::info!("Application directories initialized");
        log::debug!("  Config: {}", self.config.display());
        log::debug!("  Data:   {}", self.data.display());
        log::debug!("  Cache:  {}", self.cache.display());

        Ok(())
    }

    /// Config file next to the executable (portable install)
    pub fn local_config_file(&self) -> Option<PathBuf> {
        self.local.as_ref().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    /// Config file in the OS config directory
    pub fn system_config_file(&self) -> PathBuf {
        self.config.join(CONFIG_FILE_NAME)
    }

    /// Get path to logs directory
    pub fn logs_dir(&self) -> PathBuf {
        self.cache.join("logs")
    }
}
