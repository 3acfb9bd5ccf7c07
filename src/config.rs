use serde::Deserialize;
use std::path::PathBuf;

/// Remote-service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Application id issued by the remote document service
    pub app_id: String,
    /// Application key issued by the remote document service
    pub app_key: String,
    /// Base URL of the remote document service
    pub server_url: String,
    /// Request timeout, in seconds
    pub request_timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_key: String::new(),
            server_url: "https://localhost".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl CloudConfig {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Self::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        // Apply environment variable overrides
        if let Ok(app_id) = std::env::var("NESTLING_APP_ID") {
            config.app_id = app_id;
        }
        if let Ok(app_key) = std::env::var("NESTLING_APP_KEY") {
            config.app_key = app_key;
        }
        if let Ok(server_url) = std::env::var("NESTLING_SERVER_URL") {
            config.server_url = server_url;
        }
        if let Ok(timeout) = std::env::var("NESTLING_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.request_timeout_secs = secs;
            }
        }

        Ok(config)
    }

    /// Default config file path: ~/.config/nestling/cloud.yaml
    pub fn default_config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".config")
            .join("nestling")
            .join("cloud.yaml")
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
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    e
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
