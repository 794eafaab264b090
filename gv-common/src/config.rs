//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`GV_ROOT_FOLDER`, then `GV_ROOT`)
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file never aborts startup: a warning is logged
//! and compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Primary environment variable for the root folder
pub const ROOT_FOLDER_ENV: &str = "GV_ROOT_FOLDER";

/// Alternative environment variable for the root folder
pub const ROOT_ENV: &str = "GV_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "gv.db";

/// Default downloader program
pub const DEFAULT_DOWNLOADER_PROGRAM: &str = "freyr";

/// Placeholder substituted with the media directory in downloader arguments
pub const MEDIA_DIR_PLACEHOLDER: &str = "{media_dir}";

/// Placeholder substituted with the requested URL in downloader arguments
pub const URL_PLACEHOLDER: &str = "{url}";

/// Compiled-in defaults used when no other configuration source applies
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub port: u16,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was compiled for
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            port: default_port(),
        }
    }
}

/// Bootstrap configuration loaded from TOML file
///
/// Read once at startup. All fields are optional in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database, media and diagnostic log
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// External downloader configuration
    #[serde(default)]
    pub downloader: DownloaderConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append log output to this file instead of the console. Relative paths are
    /// resolved against the working directory.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// External downloader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Program to execute
    #[serde(default = "default_program")]
    pub program: String,

    /// Argument template; `{media_dir}` and `{url}` are substituted per job
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Media directory handed to the downloader (relative paths are resolved
    /// against the root folder). Defaults to `<root>/media`.
    #[serde(default)]
    pub media_dir: Option<PathBuf>,

    /// Grace period between downloader exit and the file locate attempt
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Upper bound on concurrently running downloader processes
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// File receiving raw downloader output when metadata extraction fails.
    /// Defaults to `<root>/downloader_output.log`.
    #[serde(default)]
    pub diagnostic_log: Option<PathBuf>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            media_dir: None,
            settle_delay_ms: default_settle_delay_ms(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            diagnostic_log: None,
        }
    }
}

impl DownloaderConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    5731
}

fn default_program() -> String {
    DEFAULT_DOWNLOADER_PROGRAM.to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "-d".to_string(),
        MEDIA_DIR_PLACEHOLDER.to_string(),
        URL_PLACEHOLDER.to_string(),
    ]
}

fn default_settle_delay_ms() -> u64 {
    5000
}

fn default_max_concurrent_downloads() -> usize {
    4
}

/// Default configuration file path (`<config dir>/gv/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gv").join("config.toml"))
}

/// Load and parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the TOML configuration, falling back to defaults
///
/// Uses `path` when given, otherwise the platform default location.
pub fn load_toml_config_or_default(path: Option<&Path>) -> TomlConfig {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => path,
        None => {
            warn!("Could not determine config directory, using defaults");
            return TomlConfig::default();
        }
    };

    if !path.exists() {
        info!("Config file {} not found, using defaults", path.display());
        return TomlConfig::default();
    }

    match load_toml_config(&path) {
        Ok(config) => {
            info!("Loaded config file {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}; using defaults", e);
            TomlConfig::default()
        }
    }
}

/// Root folder resolution across CLI, environment, TOML and compiled defaults
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    /// Command-line override (highest priority)
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Root folder from the loaded TOML config
    pub fn with_toml_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!("{}: root folder from command line", self.module_name);
            return path.clone();
        }

        for var in [ROOT_FOLDER_ENV, ROOT_ENV] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    info!("{}: root folder from {}", self.module_name, var);
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(path) = &self.toml_root {
            info!("{}: root folder from config file", self.module_name);
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout and derives paths inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root folder if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            info!("Created root folder: {}", self.root.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE_NAME)
    }

    /// Media directory, configured or `<root>/media`
    pub fn media_dir(&self, config: &DownloaderConfig) -> PathBuf {
        match &config.media_dir {
            Some(dir) => self.resolve_relative(dir),
            None => self.root.join("media"),
        }
    }

    /// Diagnostic log path, configured or `<root>/downloader_output.log`
    pub fn diagnostic_log_path(&self, config: &DownloaderConfig) -> PathBuf {
        match &config.diagnostic_log {
            Some(path) => self.resolve_relative(path),
            None => self.root.join("downloader_output.log"),
        }
    }

    fn resolve_relative(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/gv (or /var/lib/gv for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("gv"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/gv"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("gv"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/gv"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("gv"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\gv"))
    } else {
        PathBuf::from("./gv_data")
    }
}
