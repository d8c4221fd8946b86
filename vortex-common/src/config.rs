//! Bootstrap configuration loading and root folder resolution
//!
//! Bootstrap settings are the few values needed before the database is open
//! (root folder, database path, port, log level). Everything else lives in
//! the `settings` table and is loaded by the service once the pool exists.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`VORTEX_ROOT_FOLDER`)
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "VORTEX_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DEFAULT_DATABASE_FILE: &str = "vortex.db";

/// Default HTTP port of the gamification metrics service
pub const DEFAULT_PORT: u16 = 5730;

/// Bootstrap configuration loaded from TOML file
///
/// Missing fields fall back to defaults; a missing file is not an error.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Database path; relative paths resolve against the root folder
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: None,
            port: default_port(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load from an explicit path; read and parse failures are errors
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded TOML configuration from {:?}", path);
        Ok(config)
    }

    /// Load the bootstrap configuration
    ///
    /// With an explicit path the file must exist and parse. Without one the
    /// platform locations are searched; if none exists (or the found file is
    /// broken) a warning is logged and compiled defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        match find_config_file() {
            Some(path) => match Self::load_from(&path) {
                Ok(config) => Ok(config),
                Err(e) => {
                    warn!("Ignoring config file {:?}: {}", path, e);
                    Ok(Self::default())
                }
            },
            None => {
                info!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Locate the platform config file
///
/// Tries the per-user config directory first (`~/.config/vortex/config.toml`
/// on Linux), then `/etc/vortex/config.toml` on Unix.
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("vortex").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/vortex/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolve the root folder following the priority order above
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/vortex (or /var/lib/vortex for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("vortex"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/vortex"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("vortex"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/vortex"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("vortex"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\vortex"))
    } else {
        PathBuf::from("./vortex_data")
    }
}

/// Resolve the database path for a root folder
///
/// CLI override wins, then the TOML `database_path` (relative to the root
/// folder when not absolute), then `<root>/vortex.db`.
pub fn resolve_database_path(
    cli_arg: Option<&Path>,
    root_folder: &Path,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    match &toml_config.database_path {
        Some(path) if path.is_absolute() => path.clone(),
        Some(path) => root_folder.join(path),
        None => root_folder.join(DEFAULT_DATABASE_FILE),
    }
}
