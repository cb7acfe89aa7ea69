//! # Watcher Configuration
//!
//! Settings are read from an optional TOML file and then overridden by
//! `PERMWATCH_*` environment variables.
//!
//! ## Environment Variables
//! - `PERMWATCH_CREDENTIALS_PATH`: OAuth client secrets file
//! - `PERMWATCH_TOKEN_PATH`: persisted refresh token file
//! - `PERMWATCH_WEBHOOK_HOST` / `PERMWATCH_WEBHOOK_PORT`: listener address
//! - `PERMWATCH_CALLBACK_URL`: public URL the provider posts notifications to
//! - `PERMWATCH_FETCH_TIMEOUT_SECONDS`: bound on a single permission fetch
//! - `PERMWATCH_DOWNLOAD_DIR`: directory downloads are written to
//! - `PERMWATCH_API_BASE_URL`: Drive API root

use crate::error::{PermWatchError, PermWatchResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;

pub const DEFAULT_CONFIG_FILE: &str = "permwatch.toml";

pub const DEFAULT_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/drive.readonly",
    "https://www.googleapis.com/auth/drive.metadata.readonly"
];

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct PermWatchConfig {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,

    #[validate(length(min = 1, max = 255))]
    pub webhook_host: String,

    #[validate(range(min = 1, max = 65535))]
    pub webhook_port: u16,

    /// Public address of the `/updates` route, e.g. an ngrok tunnel.
    #[validate(url)]
    pub callback_url: Option<String>,

    #[validate(range(min = 1, max = 300))]
    pub fetch_timeout_seconds: u64,

    pub download_dir: PathBuf,

    #[validate(url)]
    pub api_base_url: String,

    #[validate(url)]
    pub oauth_auth_url: String,

    #[validate(url)]
    pub oauth_token_url: String,

    pub redirect_uri: String,

    #[validate(length(min = 1))]
    pub scopes: Vec<String>,

    /// Requested channel lifetime. The provider applies its own cap.
    pub channel_ttl_seconds: Option<u64>
}

impl Default for PermWatchConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            webhook_host: "0.0.0.0".to_string(),
            webhook_port: 3000,
            callback_url: None,
            fetch_timeout_seconds: 30,
            download_dir: PathBuf::from("."),
            api_base_url: "https://www.googleapis.com".to_string(),
            oauth_auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            oauth_token_url: "https://oauth2.googleapis.com/token".to_string(),
            redirect_uri: "http://localhost".to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            channel_ttl_seconds: None
        }
    }
}

impl PermWatchConfig {
    /// Loads the file (when given, else `permwatch.toml` if present),
    /// applies environment overrides and validates the result.
    pub fn load(path: Option<&Path>) -> PermWatchResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_toml_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default()
        };
        config.apply_env_overrides()?;
        config.validate_all()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> PermWatchResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PermWatchError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            PermWatchError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn apply_env_overrides(&mut self) -> PermWatchResult<()> {
        if let Ok(value) = env::var("PERMWATCH_CREDENTIALS_PATH") {
            self.credentials_path = PathBuf::from(value);
        }
        if let Ok(value) = env::var("PERMWATCH_TOKEN_PATH") {
            self.token_path = PathBuf::from(value);
        }
        if let Ok(value) = env::var("PERMWATCH_WEBHOOK_HOST") {
            self.webhook_host = value;
        }
        if let Some(port) = parse_env("PERMWATCH_WEBHOOK_PORT")? {
            self.webhook_port = port;
        }
        if let Ok(value) = env::var("PERMWATCH_CALLBACK_URL") {
            self.callback_url = Some(value);
        }
        if let Some(timeout) = parse_env("PERMWATCH_FETCH_TIMEOUT_SECONDS")? {
            self.fetch_timeout_seconds = timeout;
        }
        if let Ok(value) = env::var("PERMWATCH_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(value);
        }
        if let Ok(value) = env::var("PERMWATCH_API_BASE_URL") {
            self.api_base_url = value;
        }
        Ok(())
    }

    pub fn validate_all(&self) -> PermWatchResult<()> {
        self.validate()
            .map_err(|e| PermWatchError::ConfigError(e.to_string()))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.webhook_host, self.webhook_port)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> PermWatchResult<Option<T>>
where
    T::Err: std::fmt::Display
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| PermWatchError::ConfigError(format!("{}: {}", key, e))),
        Err(_) => Ok(None)
    }
}
