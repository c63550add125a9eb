//! Configuration for the activity collector.

use crate::history::{default_sources, HistorySource};
use crate::sink::SinkFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory the record streams are written to
    pub output_dir: PathBuf,

    /// Path for storing state and transparency logs
    pub data_path: PathBuf,

    /// Stream encoding
    pub format: SinkFormat,

    #[serde(with = "duration_serde")]
    pub window_poll_interval: Duration,

    #[serde(with = "duration_serde")]
    pub clipboard_poll_interval: Duration,

    #[serde(with = "duration_serde")]
    pub history_poll_interval: Duration,

    /// How long `stop` waits for each sampler before abandoning it
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Rows read per browser per history tick
    pub history_row_limit: usize,

    /// Which samplers to run
    pub sources: SourceConfig,

    /// Browser history databases, tried in order per browser
    pub history_sources: Vec<HistorySource>,

    /// Whether collection is currently paused
    pub paused: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity-collector");

        Self {
            output_dir: data_dir.join("data"),
            data_path: data_dir,
            format: SinkFormat::Csv,
            window_poll_interval: Duration::from_millis(1000),
            clipboard_poll_interval: Duration::from_millis(500),
            history_poll_interval: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(2),
            history_row_limit: 50,
            sources: SourceConfig::default(),
            history_sources: default_sources(),
            paused: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity-collector")
            .join("config.json")
    }

    /// Path of the persisted transparency stats.
    pub fn transparency_path(&self) -> PathBuf {
        self.data_path.join("transparency.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

/// Configuration for which samplers run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub window: bool,
    pub clipboard: bool,
    pub keyboard: bool,
    pub browser_history: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            window: true,
            clipboard: true,
            keyboard: true,
            browser_history: true,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();
        let has = |names: &[&str]| sources.iter().any(|s| s == "all" || names.contains(&s.as_str()));

        Self {
            window: has(&["window", "windows"]),
            clipboard: has(&["clipboard"]),
            keyboard: has(&["keyboard", "events"]),
            browser_history: has(&["browser", "browser_history", "history"]),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.window || self.clipboard || self.keyboard || self.browser_history
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration, as whole milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_config_parsing() {
        let config = SourceConfig::from_csv("window, clipboard");
        assert!(config.window);
        assert!(config.clipboard);
        assert!(!config.keyboard);
        assert!(!config.browser_history);

        let config = SourceConfig::from_csv("history");
        assert!(config.browser_history);
        assert!(!config.window);

        let config = SourceConfig::from_csv("all");
        assert_eq!(config, SourceConfig::default());

        assert!(!SourceConfig::from_csv("mouse").any_enabled());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window_poll_interval, Duration::from_secs(1));
        assert_eq!(config.clipboard_poll_interval, Duration::from_millis(500));
        assert_eq!(config.history_poll_interval, Duration::from_secs(60));
        assert_eq!(config.history_row_limit, 50);
        assert_eq!(config.format, SinkFormat::Csv);
        assert!(!config.paused);
        assert_eq!(config.history_sources.len(), 2);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            format: SinkFormat::Json,
            paused: true,
            clipboard_poll_interval: Duration::from_millis(250),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"clipboard_poll_interval\": 250"));
        assert!(raw.contains("\"format\": \"json\""));

        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.paused);
        assert_eq!(loaded.format, SinkFormat::Json);
        assert_eq!(loaded.clipboard_poll_interval, Duration::from_millis(250));
        assert_eq!(loaded.history_sources, config.history_sources);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "paused": true, "history_row_limit": 10 }"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.paused);
        assert_eq!(loaded.history_row_limit, 10);
        assert_eq!(loaded.window_poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let loaded = Config::load_from(Path::new("/no/such/dir/config.json")).unwrap();
        assert!(!loaded.paused);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
