// src/config.rs

use std::{fmt, path::PathBuf};
use url::Url;

use crate::error::ConfigError;

pub const ENV_DATASET_FILENAME: &str = "DATASET_FILENAME";
pub const ENV_DATASET_URL: &str = "DATASET_URL";
pub const ENV_USERNAME: &str = "RABBITMQ_USERNAME";
pub const ENV_PASSWORD: &str = "RABBITMQ_PASSWORD";
pub const ENV_QUEUE_NAME: &str = "RABBITMQ_QUEUE_NAME";

pub const DEFAULT_QUEUE_NAME: &str = "default";
pub const DEFAULT_DATASET_DIR: &str = "dataset";

/// Everything the three stages need, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub dataset_filename: String,
    pub dataset_url: Url,
    /// Where the CSV lives (and where the archive is unpacked). Not read from the environment.
    pub dataset_dir: PathBuf,
    pub username: String,
    pub password: String,
    pub queue_name: String,
}

impl Config {
    /// Build from the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let dataset_filename = require(ENV_DATASET_FILENAME)?;
        let dataset_url = Url::parse(&require(ENV_DATASET_URL)?).map_err(|source| {
            ConfigError::InvalidUrl {
                key: ENV_DATASET_URL,
                source,
            }
        })?;
        let username = require(ENV_USERNAME)?;
        let password = require(ENV_PASSWORD)?;
        let queue_name = get(ENV_QUEUE_NAME).unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string());

        Ok(Self {
            dataset_filename,
            dataset_url,
            dataset_dir: PathBuf::from(DEFAULT_DATASET_DIR),
            username,
            password,
            queue_name,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("dataset_filename", &self.dataset_filename)
            .field("dataset_url", &self.dataset_url.as_str())
            .field("dataset_dir", &self.dataset_dir)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("queue_name", &self.queue_name)
            .finish()
    }
}
