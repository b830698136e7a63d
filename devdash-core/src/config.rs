use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

const CONFIG_ENV: &str = "DEVDASH_CONFIG";

/// Where to look for projects
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectsConfig {
    /// Roots walked by `devdash scan` (`~/` is expanded)
    pub scan_paths: Vec<PathBuf>,

    /// Add discovered projects to the registry automatically
    pub auto_discover: bool,

    /// How many directory levels below a root a project may sit
    pub scan_depth: usize,
}

impl Default for ProjectsConfig {
    fn default() -> Self {
        Self {
            scan_paths: vec![PathBuf::from("~/code"), PathBuf::from("~/projects")],
            auto_discover: true,
            scan_depth: 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Poll interval for the project being watched
    pub focused_project_secs: u64,

    /// Poll interval for every other project
    pub background_project_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            focused_project_secs: 2,
            background_project_secs: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Lines retained per log buffer
    pub buffer_capacity: usize,

    /// Lines requested per service on each poll
    pub fetch_lines: usize,

    /// Interleaver flush period in milliseconds
    pub flush_interval_ms: u64,

    /// Start log views pinned to the newest line
    pub follow: bool,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: crate::log_buffer::DEFAULT_CAPACITY,
            fetch_lines: 100,
            flush_interval_ms: 50,
            follow: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Alerts kept in history
    pub capacity: usize,

    /// Only surface crash alerts
    pub notify_crashes_only: bool,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            capacity: crate::alerts::DEFAULT_ALERT_CAPACITY,
            notify_crashes_only: false,
        }
    }
}

/// Root configuration file structure
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DevdashConfig {
    pub projects: ProjectsConfig,
    pub polling: PollingConfig,
    pub logs: LogsConfig,
    pub alerts: AlertsConfig,
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {field}: must be greater than zero")]
    Zero { field: &'static str },
}

impl DevdashConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Load configuration from a string (useful for testing)
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a map.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: DevdashConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// `$DEVDASH_CONFIG`, else `<config dir>/devdash/config.yaml`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("devdash")
            .join("config.yaml")
    }

    /// Load from the default location; a missing file yields defaults.
    pub fn discover() -> Result<(PathBuf, Self), ConfigError> {
        let path = Self::default_path();
        let config = Self::load_or_default(&path)?;
        Ok((path, config))
    }

    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool); 5] = [
            ("logs.buffer_capacity", self.logs.buffer_capacity == 0),
            ("logs.flush_interval_ms", self.logs.flush_interval_ms == 0),
            ("polling.focused_project_secs", self.polling.focused_project_secs == 0),
            ("polling.background_project_secs", self.polling.background_project_secs == 0),
            ("alerts.capacity", self.alerts.capacity == 0),
        ];

        match checks.into_iter().find(|(_, is_zero)| *is_zero) {
            Some((field, _)) => Err(ConfigError::Zero { field }),
            None => Ok(()),
        }
    }

    pub fn focused_interval(&self) -> Duration {
        Duration::from_secs(self.polling.focused_project_secs)
    }

    pub fn background_interval(&self) -> Duration {
        Duration::from_secs(self.polling.background_project_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.logs.flush_interval_ms)
    }
}
