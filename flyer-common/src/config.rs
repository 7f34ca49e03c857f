//! Configuration loading and root folder resolution
//!
//! Two tiers:
//! 1. **TOML bootstrap**: root folder, logging, acquisition overrides (read once at startup)
//! 2. **Database settings**: values that may change between runs (see `flyer-acquire::config`)
//!
//! Root folder priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`FLYER_CACHE_ROOT`)
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "FLYER_CACHE_ROOT";

const APP_DIR_NAME: &str = "flyer-cache";
const DATABASE_FILE_NAME: &str = "flyer-cache.db";
const IMAGES_DIR_NAME: &str = "images";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Root folder holding the database and stored images
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Acquisition tuning, every field optional
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
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

fn default_log_level() -> String {
    "info".to_string()
}

/// Tuning for the flyer acquisition pipeline.
///
/// Constructed once by the process entry point and handed to each component.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Flyer listing endpoint
    pub listing_base_url: String,
    /// Tile host; flyer paths are appended to it
    pub tile_base_url: String,
    /// `locale` query parameter for the listing endpoint
    pub locale: String,
    /// Opaque listing session id (`sid`); resolved from several sources when unset
    pub session_id: Option<String>,
    /// Tile zoom level used in tile names
    pub zoom_level: u32,
    /// User-Agent header sent with every request
    pub user_agent: String,
    /// Pause after each successful tile fetch
    pub request_delay_ms: u64,
    /// Timeout for the listing query
    pub listing_timeout_secs: u64,
    /// Timeout for each tile fetch
    pub tile_timeout_secs: u64,
    /// Leading empty rows tolerated before discovery gives up
    pub max_leading_empty_rows: u32,
    /// Extra attempts for a tile that failed transiently
    pub tile_retry_attempts: u32,
    /// Maximum age of a cached image still served
    pub freshness_window_days: i64,
    /// Acquisitions allowed to run at once
    pub max_concurrent_acquisitions: usize,
    /// Upper bound on one whole acquisition
    pub acquisition_timeout_secs: u64,
    /// Category used when the caller does not name one
    pub default_category: String,
}

pub const DEFAULT_SESSION_ID: &str = "5672125193598641";

/// Ten years; larger windows overflow timestamp arithmetic
pub const MAX_FRESHNESS_WINDOW_DAYS: i64 = 3650;

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            listing_base_url: "https://flyers-ng.flippback.com/api/flipp/data".to_string(),
            tile_base_url: "https://f.wishabi.net/".to_string(),
            locale: "en".to_string(),
            session_id: None,
            zoom_level: 4,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            request_delay_ms: 100,
            listing_timeout_secs: 30,
            tile_timeout_secs: 15,
            max_leading_empty_rows: 15,
            tile_retry_attempts: 2,
            freshness_window_days: 7,
            max_concurrent_acquisitions: 4,
            acquisition_timeout_secs: 300,
            default_category: "Groceries".to_string(),
        }
    }
}

impl AcquisitionConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_secs)
    }

    pub fn tile_timeout(&self) -> Duration {
        Duration::from_secs(self.tile_timeout_secs)
    }

    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_secs(self.acquisition_timeout_secs)
    }

    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.freshness_window_days)
    }

    /// Session id to send, falling back to the built-in one
    pub fn session_id_or_default(&self) -> &str {
        self.session_id.as_deref().unwrap_or(DEFAULT_SESSION_ID)
    }

    /// Reject values that would make the pipeline hang or never fetch
    pub fn validate(&self) -> Result<()> {
        if self.listing_base_url.trim().is_empty() {
            return Err(Error::Config("listing_base_url must not be empty".to_string()));
        }
        if self.tile_base_url.trim().is_empty() {
            return Err(Error::Config("tile_base_url must not be empty".to_string()));
        }
        if self.listing_timeout_secs == 0 || self.tile_timeout_secs == 0 {
            return Err(Error::Config("request timeouts must be at least 1 second".to_string()));
        }
        if self.acquisition_timeout_secs == 0 {
            return Err(Error::Config("acquisition_timeout_secs must be at least 1".to_string()));
        }
        if self.max_concurrent_acquisitions == 0 {
            return Err(Error::Config("max_concurrent_acquisitions must be at least 1".to_string()));
        }
        if self.freshness_window_days < 0 {
            return Err(Error::Config("freshness_window_days must not be negative".to_string()));
        }
        if self.freshness_window_days > MAX_FRESHNESS_WINDOW_DAYS {
            return Err(Error::Config(format!(
                "freshness_window_days must not exceed {}",
                MAX_FRESHNESS_WINDOW_DAYS
            )));
        }
        Ok(())
    }
}

/// Load the bootstrap TOML.
///
/// An explicit path must exist; otherwise the platform default location is tried and
/// built-in defaults are used when it is absent.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit_path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                debug!("No config file found, using built-in defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.acquisition.validate()?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Platform config file location (`~/.config/flyer-cache/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"))
}

/// Resolve the root folder following the priority order in the module docs
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./flyer_cache_data"))
}

/// On-disk layout beneath the root folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootLayout {
    pub root: PathBuf,
    pub database_path: PathBuf,
    pub images_dir: PathBuf,
}

impl RootLayout {
    pub fn new(root: PathBuf) -> Self {
        Self {
            database_path: root.join(DATABASE_FILE_NAME),
            images_dir: root.join(IMAGES_DIR_NAME),
            root,
        }
    }

    /// Create the root and image directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.images_dir)?;
        Ok(())
    }

    /// Layout rooted at the absolute, symlink-free form of `root`.
    ///
    /// Stored image paths derive from the root, so every run must spell it the same way.
    /// The root must already exist.
    pub fn canonicalize(self) -> Result<Self> {
        let root = std::fs::canonicalize(&self.root)?;
        Ok(Self::new(root))
    }
}
