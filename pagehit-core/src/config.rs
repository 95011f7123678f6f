//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/pagehit/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/pagehit/` (~/.config/pagehit/)
//! - State/Logs: `$XDG_STATE_HOME/pagehit/` (~/.local/state/pagehit/)

use crate::error::{Error, Result};
use crate::types::dimension_index;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Default collection endpoint (Measurement Protocol v1)
pub const DEFAULT_ENDPOINT_URL: &str = "https://www.google-analytics.com/collect";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Tracking settings, snapshotted into every request
    #[serde(default)]
    pub tracking: Settings,

    /// SEO title overrides
    #[serde(default)]
    pub seo: SeoConfig,

    /// HTTP server and template host configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the coordinator hands a finished hit to the delivery client
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Await the delivery call before the request continues
    #[default]
    Inline,
    /// Spawn the delivery call on its own task, bounded by the timeout
    Detached,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Inline => "inline",
            DeliveryMode::Detached => "detached",
        }
    }
}

/// Tracking settings
///
/// Read-only once loaded. Each request holds an `Arc<Settings>` snapshot.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Send a page view automatically after the page template renders
    #[serde(default = "default_true")]
    pub auto_send_page_view: bool,

    /// Master switch for sending hits
    #[serde(default)]
    pub tracking_enabled: bool,

    /// Property tracking id (e.g. "UA-12345-1")
    #[serde(default)]
    pub tracking_id: String,

    /// Collection endpoint URL
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Inline or detached delivery
    #[serde(default)]
    pub delivery_mode: DeliveryMode,

    /// Skip hits from crawler user agents
    #[serde(default = "default_true")]
    pub filter_bot_user_agents: bool,

    /// Custom dimensions attached to every page view (index -> value)
    #[serde(default)]
    pub custom_dimensions: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_send_page_view: true,
            tracking_enabled: false,
            tracking_id: String::new(),
            endpoint_url: default_endpoint_url(),
            timeout_secs: default_timeout(),
            delivery_mode: DeliveryMode::default(),
            filter_bot_user_agents: true,
            custom_dimensions: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Check if tracking is enabled and a tracking id is configured
    pub fn is_ready(&self) -> bool {
        self.tracking_enabled && !self.tracking_id.trim().is_empty()
    }

    /// Validate configuration, returning error message if invalid
    ///
    /// A disabled or id-less configuration is valid: it just never sends.
    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.endpoint_url).map_err(|e| {
            Error::Config(format!(
                "tracking.endpoint_url {:?} is not a valid URL: {}",
                self.endpoint_url, e
            ))
        })?;

        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "tracking.timeout_secs must be greater than 0".to_string(),
            ));
        }

        for key in self.custom_dimensions.keys() {
            if dimension_index(key).is_none() {
                return Err(Error::Config(format!(
                    "tracking.custom_dimensions key {:?} must be an index from 1 to 200",
                    key
                )));
            }
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_endpoint_url() -> String {
    DEFAULT_ENDPOINT_URL.to_string()
}

fn default_timeout() -> u64 {
    5
}

/// SEO title configuration
///
/// Backs [`ConfiguredTitles`](crate::enrich::ConfiguredTitles).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SeoConfig {
    /// Whether the SEO layer renders titles at all
    #[serde(default)]
    pub render_enabled: bool,

    /// Site name appended to every resolved title
    pub site_name: Option<String>,

    /// Separator between page title and site name
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Per-template titles (template id -> title)
    #[serde(default)]
    pub titles: HashMap<String, String>,
}

fn default_separator() -> String {
    " | ".to_string()
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Directory holding site templates
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// First path segment that marks control panel requests
    #[serde(default = "default_cp_trigger")]
    pub cp_trigger: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            templates_dir: default_templates_dir(),
            cp_trigger: default_cp_trigger(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_cp_trigger() -> String {
    "admin".to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.tracking.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/pagehit/config.toml` (~/.config/pagehit/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("pagehit").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/pagehit/` (~/.local/state/pagehit/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("pagehit")
    }
}
