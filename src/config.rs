use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::errors::{AppError, Result};

/// Prefix for environment overrides, e.g. `SPOTUBE_POLL_INTERVAL_MS=50`.
const ENV_PREFIX: &str = "SPOTUBE";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub download_path: PathBuf,
    /// Cadence of the foreground drain-then-tick loop.
    pub poll_interval_ms: u64,
    /// Track titles longer than this are shortened on screen.
    pub title_max_len: usize,
    /// `None` waits for the worker forever on stop.
    pub stop_timeout_secs: Option<u64>,
    pub helper_command: String,
    pub helper_args: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_path: dirs::download_dir()
                .unwrap_or_else(|| PathBuf::from("./downloads")),
            poll_interval_ms: 100,
            title_max_len: 40,
            stop_timeout_secs: None,
            helper_command: "spotube-helper".to_string(),
            helper_args: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Reads the JSON file at `path` if present, then applies environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("helper_args"),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(config_dir) = path.parent() {
            if !config_dir.exists() {
                std::fs::create_dir_all(config_dir)?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::Config(config::ConfigError::Message("Could not find config directory".to_string())))?;

        Ok(config_dir.join("spotube").join("config.json"))
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(AppError::Validation("poll_interval_ms must be greater than zero".to_string()));
        }
        if self.title_max_len == 0 {
            return Err(AppError::Validation("title_max_len must be greater than zero".to_string()));
        }
        if self.helper_command.trim().is_empty() {
            return Err(AppError::Validation("helper_command cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_secs.map(Duration::from_secs)
    }
}
