use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_COLLECTION: &str = "posts";
pub const DEFAULT_OWNER_REF: &str = "1";

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Remote collection settings
#[derive(Debug, Clone, Serialize)]
pub struct RemoteConfig {
    pub base_url: ConfigValue<String>,
    pub collection: String,
    pub owner_ref: ConfigValue<String>,
    /// Upper bound for each request, in seconds
    pub timeout_secs: u64,
}

/// Sync behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Sync before reads and after writes (default: false)
    pub auto_sync: bool,
    /// Interval for `sync watch` and `sync auto on`
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: false,
            interval_secs: 60,
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the persisted replica, queue and settings
    pub data_dir: ConfigValue<PathBuf>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RemoteFile {
    base_url: Option<String>,
    collection: Option<String>,
    owner_ref: Option<String>,
    timeout_secs: Option<u64>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    remote: Option<RemoteFile>,
    sync: Option<SyncConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut base_url = ConfigValue::new(DEFAULT_BASE_URL.to_string(), ConfigSource::Default);
        let mut owner_ref = ConfigValue::new(DEFAULT_OWNER_REF.to_string(), ConfigSource::Default);
        let mut collection = DEFAULT_COLLECTION.to_string();
        let mut timeout_secs = 10;
        let mut config_file = None;
        let mut sync = SyncConfig::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Relative to the config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(remote) = file_config.remote {
                if let Some(url) = remote.base_url {
                    base_url = ConfigValue::new(url, ConfigSource::File);
                }
                if let Some(owner) = remote.owner_ref {
                    owner_ref = ConfigValue::new(owner, ConfigSource::File);
                }
                if let Some(name) = remote.collection {
                    collection = name;
                }
                if let Some(secs) = remote.timeout_secs {
                    timeout_secs = secs;
                }
            }
            if let Some(sync_config) = file_config.sync {
                sync = sync_config;
            }
        }

        if let Ok(dir) = std::env::var("QUOTES_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("QUOTES_REMOTE_URL") {
            base_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        if let Ok(owner) = std::env::var("QUOTES_OWNER_REF") {
            owner_ref = ConfigValue::new(owner, ConfigSource::Environment);
        }

        Ok(Self {
            data_dir,
            config_file,
            remote: RemoteConfig {
                base_url,
                collection,
                owner_ref,
                timeout_secs: timeout_secs.max(1),
            },
            sync,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/quotes/
    /// - macOS: ~/Library/Application Support/quotes/
    /// - Windows: %APPDATA%/quotes/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quotes")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/quotes/
    /// - macOS: ~/Library/Application Support/quotes/
    /// - Windows: %APPDATA%/quotes/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quotes")
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
