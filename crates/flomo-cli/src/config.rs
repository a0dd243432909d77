//! Persistent CLI configuration and its environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use flomo_core::remote::{normalize_token, RemoteConfig};
use flomo_core::sync::RetryPolicy;
use flomo_core::util::normalize_text_option;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "config.json";
pub const TOKEN_ENV: &str = "FLOMO_AUTHORIZATION";
pub const DB_PATH_ENV: &str = "FLOMO_DB_PATH";
pub const API_BASE_URL_ENV: &str = "FLOMO_API_BASE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    /// Stored with its `Bearer ` prefix
    #[serde(default)]
    pub authorization: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub timezone_offset_hours: Option<i32>,
    #[serde(default)]
    pub retry_attempts: Option<u32>,
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("flomo")
        .join(CONFIG_FILE_NAME)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("flomo")
        .join("flomo.db")
}

impl CliConfig {
    pub fn load() -> Result<Self, CliError> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            CliError::Config(format!("Failed to read config at {}: {error}", path.display()))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            CliError::Config(format!("Failed to parse config at {}: {error}", path.display()))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, CliError> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                CliError::Config(format!(
                    "Failed to create config directory {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized).map_err(|error| {
            CliError::Config(format!("Failed to write config at {}: {error}", path.display()))
        })
    }

    /// Store a token, adding the `Bearer ` prefix when missing
    pub fn set_token(&mut self, raw: &str) -> Result<(), CliError> {
        self.authorization = Some(normalize_token(raw)?);
        Ok(())
    }

    fn normalize(&mut self) {
        self.authorization = normalize_text_option(self.authorization.take());
        self.api_base_url = normalize_text_option(self.api_base_url.take());
        self.page_size = self.page_size.filter(|size| *size > 0);
        self.retry_attempts = self.retry_attempts.filter(|attempts| *attempts > 0);
    }
}

/// Effective settings after layering file, environment and flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub token: Option<String>,
    pub api_base_url: Option<String>,
    pub db_path: PathBuf,
    pub page_size: Option<usize>,
    pub timezone_offset_hours: Option<i32>,
    pub retry_attempts: Option<u32>,
}

impl Settings {
    /// Resolve from the process environment
    pub fn resolve(cli_db_path: Option<PathBuf>, config: &CliConfig) -> Self {
        Self::resolve_with(cli_db_path, config, |key| std::env::var(key).ok())
    }

    /// `--db-path` beats the environment, which beats the config file.
    pub fn resolve_with(
        cli_db_path: Option<PathBuf>,
        config: &CliConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let from_env = |key: &str| normalize_text_option(env(key));

        Self {
            token: from_env(TOKEN_ENV).or_else(|| config.authorization.clone()),
            api_base_url: from_env(API_BASE_URL_ENV).or_else(|| config.api_base_url.clone()),
            db_path: cli_db_path
                .or_else(|| from_env(DB_PATH_ENV).map(PathBuf::from))
                .or_else(|| config.db_path.clone())
                .unwrap_or_else(default_db_path),
            page_size: config.page_size,
            timezone_offset_hours: config.timezone_offset_hours,
            retry_attempts: config.retry_attempts,
        }
    }

    /// Remote client settings; fails when no token is configured.
    pub fn remote_config(&self) -> Result<RemoteConfig, CliError> {
        let token = self.token.as_deref().ok_or(CliError::TokenNotConfigured)?;
        let mut remote = RemoteConfig::new(token)?;
        if let Some(base_url) = &self.api_base_url {
            remote = remote.with_base_url(base_url)?;
        }
        if let Some(page_size) = self.page_size {
            remote = remote.with_page_size(page_size);
        }
        if let Some(hours) = self.timezone_offset_hours {
            remote = remote.with_timezone_hours(hours)?;
        }
        Ok(remote.with_timeout(Duration::from_secs(30)))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::default();
        if let Some(attempts) = self.retry_attempts {
            policy.max_attempts = attempts;
        }
        policy
    }
}
