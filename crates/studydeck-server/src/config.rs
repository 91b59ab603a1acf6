//! Server configuration.

use crate::logging::LoggingSettings;
use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use studydeck_core::{GeminiConfig, ToolTimings};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Quiet period before quiz and flashcard progress is saved.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Length of each flashcard slide phase.
    #[serde(default = "default_slide_ms")]
    pub slide_ms: u64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    /// Mounted tools unused this long are unmounted.
    #[serde(default = "default_tool_idle_secs")]
    pub tool_idle_secs: u64,
    /// How often to look for idle tools.
    #[serde(default = "default_tool_sweep_secs")]
    pub tool_sweep_secs: u64,
    #[serde(default)]
    pub gemini: GeminiSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSettings {
    /// Falls back to GEMINI_API_KEY, then API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./frontend/dist")
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("studydeck")
        .join("studydeck.db")
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_slide_ms() -> u64 {
    300
}

fn default_bcrypt_cost() -> u32 {
    12
}

fn default_tool_idle_secs() -> u64 {
    30 * 60
}

fn default_tool_sweep_secs() -> u64 {
    60
}

fn default_model() -> String {
    GeminiConfig::default().model
}

fn default_endpoint() -> String {
    GeminiConfig::default().endpoint
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            db_path: default_db_path(),
            debounce_ms: default_debounce_ms(),
            slide_ms: default_slide_ms(),
            bcrypt_cost: default_bcrypt_cost(),
            tool_idle_secs: default_tool_idle_secs(),
            tool_sweep_secs: default_tool_sweep_secs(),
            gemini: GeminiSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from default location (config/default.toml) or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("config/default.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }

        Ok(Config::default())
    }

    pub fn timings(&self) -> ToolTimings {
        ToolTimings {
            debounce: Duration::from_millis(self.debounce_ms),
            slide: Duration::from_millis(self.slide_ms),
        }
    }

    pub fn tool_idle_limit(&self) -> Duration {
        Duration::from_secs(self.tool_idle_secs)
    }

    pub fn tool_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.tool_sweep_secs)
    }

    /// Gemini client settings, reading the key from the environment when the
    /// file does not set one.
    pub fn gemini_config(&self) -> GeminiConfig {
        let api_key = self
            .gemini
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env_string("GEMINI_API_KEY"))
            .or_else(|| env_string("API_KEY"));

        GeminiConfig {
            api_key,
            model: self.gemini.model.clone(),
            endpoint: self.gemini.endpoint.clone(),
            timeout: Duration::from_secs(self.gemini.timeout_secs),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            port = 9000
            debounce_ms = 250

            [gemini]
            api_key = "file-key"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.slide_ms, 300);
        assert_eq!(config.timings().debounce, Duration::from_millis(250));
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.gemini_config().api_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn test_default_timings() {
        let config = Config::default();
        assert_eq!(config.timings(), ToolTimings::default());
        assert_eq!(config.tool_idle_limit(), Duration::from_secs(1800));
        assert_eq!(config.tool_sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_tool_and_logging_sections() {
        let config: Config = toml::from_str(
            r#"
            tool_idle_secs = 300

            [logging]
            verbosity = "debug"
            targets = { store = "trace" }
            "#,
        )
        .unwrap();

        assert_eq!(config.tool_idle_limit(), Duration::from_secs(300));
        assert_eq!(config.tool_sweep_secs, 60);
        assert_eq!(config.logging.verbosity, crate::logging::Verbosity::Debug);
        assert_eq!(config.logging.format, crate::logging::LogFormat::Text);
        assert_eq!(config.logging.targets.get("store").map(String::as_str), Some("trace"));
    }
}
