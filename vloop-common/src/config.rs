//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a TOML file (`vloop.toml`). A missing or
//! unreadable file is never fatal: a warning is logged and built-in defaults
//! apply. The root folder (database, uploads) is resolved in priority order:
//!
//! 1. Command-line argument
//! 2. `VLOOP_ROOT_FOLDER` environment variable
//! 3. `root_folder` key in the TOML file
//! 4. OS-dependent compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "VLOOP_ROOT_FOLDER";

/// Environment variable pointing at an explicit TOML file
pub const CONFIG_FILE_ENV: &str = "VLOOP_CONFIG";

/// Built-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/vloop (or /var/lib/vloop for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("vloop"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/vloop"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("vloop"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/vloop"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("vloop"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\vloop"))
    } else {
        PathBuf::from("./vloop_data")
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which Entity Store backend the server persists through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite database file (`vloop.db`)
    #[default]
    Sqlite,
    /// Single JSON document (`db.json`)
    Json,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "json" => Ok(StoreBackend::Json),
            other => Err(format!("unknown store backend '{}' (expected sqlite or json)", other)),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Sqlite => write!(f, "sqlite"),
            StoreBackend::Json => write!(f, "json"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (trace, debug, info, warn, error)
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

/// `[server]` table
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub store_backend: StoreBackend,
    /// Largest accepted upload body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_upload_bytes() -> usize {
    2 * 1024 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            store_backend: StoreBackend::default(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// `[player]` table
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Watchdog on the end-of-playlist refresh
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,
    #[serde(default = "default_player_command")]
    pub player_command: String,
    #[serde(default = "default_player_args")]
    pub player_args: Vec<String>,
    #[serde(default = "default_mute_arg")]
    pub mute_arg: String,
    /// Added to the command line while the surface is in fullscreen
    #[serde(default = "default_fullscreen_arg")]
    pub fullscreen_arg: String,
}

fn default_server_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_refresh_timeout_secs() -> u64 {
    10
}

fn default_player_command() -> String {
    "mpv".to_string()
}

fn default_player_args() -> Vec<String> {
    vec!["--really-quiet".to_string()]
}

fn default_mute_arg() -> String {
    "--mute=yes".to_string()
}

fn default_fullscreen_arg() -> String {
    "--fs".to_string()
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            profile: None,
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            refresh_timeout_secs: default_refresh_timeout_secs(),
            player_command: default_player_command(),
            player_args: default_player_args(),
            mute_arg: default_mute_arg(),
            fullscreen_arg: default_fullscreen_arg(),
        }
    }
}

impl PlayerConfig {
    /// Intervals of zero would spin the heartbeat timer and time out every
    /// request immediately
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_secs == 0 {
            return Err(Error::Config(
                "[player] heartbeat_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.refresh_timeout_secs == 0 {
            return Err(Error::Config(
                "[player] refresh_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bootstrap configuration loaded from TOML
///
/// Cannot change while running; restart to pick up edits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

impl TomlConfig {
    /// Parse a TOML file. Errors if the file is missing or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?;
        config.player.validate().map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} in {}", msg, path.display())),
            other => other,
        })?;
        Ok(config)
    }

    /// Load from `explicit`, else `VLOOP_CONFIG`, else the platform config
    /// locations. Falls back to defaults with a warning.
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let (config, source) = Self::load_quietly(explicit);
        source.log();
        config
    }

    /// Same lookup as [`TomlConfig::load_or_default`] without logging, for
    /// binaries that need the config before tracing is installed. Call
    /// [`ConfigSource::log`] once it is.
    pub fn load_quietly(explicit: Option<&Path>) -> (Self, ConfigSource) {
        let candidate = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from))
            .or_else(find_config_file);

        match candidate {
            Some(path) => match Self::load(&path) {
                Ok(config) => (config, ConfigSource::File(path)),
                Err(e) => (Self::default(), ConfigSource::Invalid(e.to_string())),
            },
            None => (Self::default(), ConfigSource::Defaults),
        }
    }
}

/// Where a [`TomlConfig`] came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// A file was found but could not be used
    Invalid(String),
    Defaults,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Invalid(reason) => warn!("{}; using built-in defaults", reason),
            ConfigSource::Defaults => warn!("No configuration file found; using built-in defaults"),
        }
    }
}

/// Platform configuration file, if one exists
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("vloop").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }
    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/vloop/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    None
}

/// Resolves the root folder following the documented priority order
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

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!("[{}] Root folder from command line: {}", self.module_name, path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                info!("[{}] Root folder from {}: {}", self.module_name, ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            info!("[{}] Root folder from config file: {}", self.module_name, path.display());
            return path.clone();
        }

        let path = CompiledDefaults::for_current_platform().root_folder;
        info!("[{}] Root folder (default): {}", self.module_name, path.display());
        path
    }
}

/// Creates the root folder layout and names the files inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root folder and its `uploads/` directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.uploads_path())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join("vloop.db")
    }

    pub fn json_dataset_path(&self) -> PathBuf {
        self.root.join("db.json")
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.root.join("uploads")
    }
}
